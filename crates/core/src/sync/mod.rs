//! Sync domain models and services.

mod ledger_sync_coordinator;
mod ledger_sync_model;
mod ledger_sync_policy;
mod ledger_sync_scheduler;
mod remote;

pub use ledger_sync_coordinator::*;
pub use ledger_sync_model::*;
pub use ledger_sync_policy::*;
pub use ledger_sync_scheduler::*;
pub use remote::*;

#[cfg(test)]
mod tests;
