//! Local durable key-value store contract and the persisted key names.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{Error, Result};

/// Full ledger snapshot, serialized as JSON.
pub const LEDGER_SNAPSHOT_KEY: &str = "ledger_snapshot";
/// Remote link configuration (client id, api key, spreadsheet id).
pub const REMOTE_LINK_CONFIG_KEY: &str = "remote_link_config";
/// Display currency preference.
pub const CURRENCY_KEY: &str = "currency";
/// Whether remote sync was enabled by the user.
pub const SYNC_ENABLED_KEY: &str = "sync_enabled";
/// Access token with its absolute expiry.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Whether the first-run setup was completed.
pub const SETUP_COMPLETE_KEY: &str = "setup_complete";

/// Key-value persistence that mirrors local state across sessions.
///
/// Implementations must be cheap to call from synchronous code paths; the ledger
/// store writes through on every mutation.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local store, used for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Read a JSON value stored under `key`.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write `value` as JSON under `key`.
pub fn set_json<T: serde::Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
