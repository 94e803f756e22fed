//! Core domain for homeledger: the household ledger, its local persistence contracts,
//! credentials, and the sync domain model consumed by the sync engine.

pub mod errors;
pub mod ledger;
pub mod secrets;
pub mod settings;
pub mod storage;
pub mod sync;

pub use errors::{Error, Result};
