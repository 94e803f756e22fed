//! Background sync engine mirroring the household ledger to a remote spreadsheet.
//!
//! Three cooperative timers run on the caller's Tokio runtime: a debounced push armed by
//! ledger mutations, a fixed-interval pull, and a credential refresher. All coordination
//! state lives in [`homeledger_core::sync::SyncCoordinator`].

mod debounce;
mod engine;
mod error;
mod pull;
mod push;
mod refresher;
mod runtime;

pub use debounce::Debouncer;
pub use engine::SyncEngine;
pub use error::{Result, SyncEngineError};
