//! Ledger sync domain models shared by the engine and its observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger_sync_policy::SyncErrorKind;

/// User-visible sync indicator. Derived from coordinator state, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Saving,
    Fetching,
    Error,
    Offline,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Saving => "saving",
            Self::Fetching => "fetching",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

/// Whether the remote link is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Not configured, or explicitly disconnected by the user.
    Unlinked,
    Linked,
    /// Dropped after an auth failure; only `connect()` re-links.
    Revoked,
}

/// Trigger source for push cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCycleTrigger {
    LocalMutation,
    Retry,
    Seed,
    Manual,
}

/// A classified failure, as surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncFailure {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Read-only view of the sync engine published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    pub link: LinkState,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_kind: Option<SyncErrorKind>,
    pub retry_count: u32,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            status: SyncStatus::Offline,
            link: LinkState::Unlinked,
            last_synced_at: None,
            last_error: None,
            last_error_kind: None,
            retry_count: 0,
        }
    }
}

/// Remote spreadsheet the ledger is mirrored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLinkConfig {
    pub client_id: String,
    pub api_key: String,
    pub spreadsheet_id: String,
}

impl RemoteLinkConfig {
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            spreadsheet_id: spreadsheet_id.into().trim().to_string(),
        }
    }

    /// All three fields are required before any remote call is attempted.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.spreadsheet_id.trim().is_empty()
    }
}

/// Everything a transport call needs to address and authorize a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub spreadsheet_id: String,
    pub api_key: String,
    pub access_token: String,
}

impl RemoteTarget {
    pub fn new(config: &RemoteLinkConfig, access_token: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_key: config.api_key.clone(),
            access_token: access_token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_config_requires_all_fields() {
        assert!(RemoteLinkConfig::new("id", "key", "sheet").is_complete());
        assert!(!RemoteLinkConfig::new("id", "  ", "sheet").is_complete());
        assert!(!RemoteLinkConfig::new("", "key", "sheet").is_complete());
    }

    #[test]
    fn sync_status_serialization_matches_ui_contract() {
        let actual = [
            SyncStatus::Synced,
            SyncStatus::Saving,
            SyncStatus::Fetching,
            SyncStatus::Error,
            SyncStatus::Offline,
        ]
        .iter()
        .map(|status| serde_json::to_string(status).expect("serialize status"))
        .collect::<Vec<_>>();

        assert_eq!(
            actual,
            vec![
                "\"synced\"",
                "\"saving\"",
                "\"fetching\"",
                "\"error\"",
                "\"offline\""
            ]
        );
    }
}
