//! Secret persistence and the access-token credential store.

mod credential_store;

pub use credential_store::*;

use crate::errors::Result;
use crate::storage::{KeyValueStore, MemoryKeyValueStore};

/// Storage key for the long-lived OAuth refresh token.
pub const OAUTH_REFRESH_TOKEN_KEY: &str = "oauth_refresh_token";

/// Trait for storing secrets that must never land in the ledger snapshot.
pub trait SecretStore: Send + Sync {
    fn set_secret(&self, key: &str, value: &str) -> Result<()>;
    fn get_secret(&self, key: &str) -> Result<Option<String>>;
    fn delete_secret(&self, key: &str) -> Result<()>;
}

impl SecretStore for MemoryKeyValueStore {
    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.set(&format!("secret:{key}"), value)
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        self.get(&format!("secret:{key}"))
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        self.delete(&format!("secret:{key}"))
    }
}
