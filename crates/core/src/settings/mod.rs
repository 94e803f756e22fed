//! User preferences persisted in the local key-value store.

use log::warn;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::storage::{
    get_json, set_json, KeyValueStore, CURRENCY_KEY, REMOTE_LINK_CONFIG_KEY, SETUP_COMPLETE_KEY,
    SYNC_ENABLED_KEY,
};
use crate::sync::RemoteLinkConfig;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone)]
pub struct AppPreferences {
    store: Arc<dyn KeyValueStore>,
}

impl AppPreferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn flag(&self, key: &str) -> bool {
        match get_json::<bool>(self.store.as_ref(), key) {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                warn!("[Settings] Failed to read '{}': {}", key, err);
                false
            }
        }
    }

    pub fn currency(&self) -> String {
        self.store
            .get(CURRENCY_KEY)
            .ok()
            .flatten()
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    /// Store an ISO 4217 currency code (three ASCII letters).
    pub fn set_currency(&self, code: &str) -> Result<()> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a currency code",
                code
            )));
        }
        self.store.set(CURRENCY_KEY, &code)
    }

    pub fn is_setup_complete(&self) -> bool {
        self.flag(SETUP_COMPLETE_KEY)
    }

    pub fn mark_setup_complete(&self) -> Result<()> {
        set_json(self.store.as_ref(), SETUP_COMPLETE_KEY, &true)
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.flag(SYNC_ENABLED_KEY)
    }

    pub fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        set_json(self.store.as_ref(), SYNC_ENABLED_KEY, &enabled)
    }

    pub fn remote_link_config(&self) -> Option<RemoteLinkConfig> {
        match get_json::<RemoteLinkConfig>(self.store.as_ref(), REMOTE_LINK_CONFIG_KEY) {
            Ok(config) => config,
            Err(err) => {
                warn!("[Settings] Stored remote link config is unreadable: {}", err);
                None
            }
        }
    }

    pub fn save_remote_link_config(&self, config: &RemoteLinkConfig) -> Result<()> {
        set_json(self.store.as_ref(), REMOTE_LINK_CONFIG_KEY, config)
    }

    pub fn clear_remote_link_config(&self) -> Result<()> {
        self.store.delete(REMOTE_LINK_CONFIG_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;

    #[test]
    fn defaults_when_nothing_is_stored() {
        let prefs = AppPreferences::new(Arc::new(MemoryKeyValueStore::new()));
        assert_eq!(prefs.currency(), "USD");
        assert!(!prefs.is_setup_complete());
        assert!(!prefs.is_sync_enabled());
        assert!(prefs.remote_link_config().is_none());
    }

    #[test]
    fn currency_is_validated_and_normalized() {
        let prefs = AppPreferences::new(Arc::new(MemoryKeyValueStore::new()));
        prefs.set_currency(" eur ").unwrap();
        assert_eq!(prefs.currency(), "EUR");
        assert!(prefs.set_currency("euro").is_err());
    }

    #[test]
    fn remote_link_config_round_trips() {
        let prefs = AppPreferences::new(Arc::new(MemoryKeyValueStore::new()));
        let config = RemoteLinkConfig::new("client.apps.example", "AIza-key", "sheet-123");
        prefs.save_remote_link_config(&config).unwrap();
        prefs.set_sync_enabled(true).unwrap();
        assert_eq!(prefs.remote_link_config(), Some(config));
        assert!(prefs.is_sync_enabled());

        prefs.clear_remote_link_config().unwrap();
        assert!(prefs.remote_link_config().is_none());
    }
}
