//! Household ledger: records, the in-memory store, and the remote table codec.

mod ledger_model;
mod ledger_store;
mod table_codec;

pub use ledger_model::*;
pub use ledger_store::*;
pub use table_codec::*;
