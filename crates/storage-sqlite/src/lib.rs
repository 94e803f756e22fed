//! SQLite persistence for homeledger's local durable cache and secrets.

mod db;
pub mod errors;
mod kv_store;

pub use errors::StorageError;
pub use kv_store::SqliteKeyValueStore;
