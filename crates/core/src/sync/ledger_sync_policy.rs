//! Failure classification and retry policy for remote calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::ledger_sync_scheduler::{MAX_PUSH_RETRIES, PUSH_RETRY_BASE_DELAY_MS};

/// Failure taxonomy driving the status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// 401/403 or an auth-looking message. Disconnects; user must reconnect.
    AuthExpired,
    /// 404. Surfaced, never retried.
    RemoteNotFound,
    /// Transport-level failure. Retried with backoff up to the cap.
    NetworkTransient,
    /// Anything else. Surfaced with the raw message, never retried.
    Unclassified,
}

impl SyncErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "auth_expired",
            Self::RemoteNotFound => "remote_not_found",
            Self::NetworkTransient => "network_transient",
            Self::Unclassified => "unclassified",
        }
    }
}

/// Failure raised by a remote transport or credential provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteCallError {
    /// Non-success HTTP response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Connection, timeout or other transport failure; no response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Response arrived but could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No usable credential was available to make the call.
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),
}

impl RemoteCallError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn classify(&self) -> SyncErrorKind {
        match self {
            Self::Api { status, message } => match classify_http_status(*status) {
                SyncErrorKind::Unclassified if message_indicates_auth(message) => {
                    SyncErrorKind::AuthExpired
                }
                kind => kind,
            },
            Self::Network(_) => SyncErrorKind::NetworkTransient,
            Self::Unauthenticated(_) => SyncErrorKind::AuthExpired,
            Self::Decode(message) if message_indicates_auth(message) => SyncErrorKind::AuthExpired,
            Self::Decode(_) => SyncErrorKind::Unclassified,
        }
    }

    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self.classify() {
            SyncErrorKind::AuthExpired => "Session expired. Please reconnect.".to_string(),
            SyncErrorKind::RemoteNotFound => {
                "Spreadsheet not found. Check the spreadsheet ID.".to_string()
            }
            SyncErrorKind::NetworkTransient => format!("Network error: {}", self.detail()),
            SyncErrorKind::Unclassified => self.detail(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Network(message) | Self::Decode(message) | Self::Unauthenticated(message) => {
                message.clone()
            }
        }
    }
}

/// Classify an HTTP status into the failure taxonomy.
pub fn classify_http_status(status: u16) -> SyncErrorKind {
    match status {
        401 | 403 => SyncErrorKind::AuthExpired,
        404 => SyncErrorKind::RemoteNotFound,
        408 | 429 | 500..=599 => SyncErrorKind::NetworkTransient,
        _ => SyncErrorKind::Unclassified,
    }
}

fn message_indicates_auth(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    [
        "unauthenticated",
        "unauthorized",
        "invalid_grant",
        "invalid credentials",
        "token expired",
        "permission_denied",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Delay before the `retry_count`-th automatic push retry (1-based): linear in the count.
pub fn push_retry_delay(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(retry_count.max(1))
}

/// Default-policy variant of [`push_retry_delay`].
pub fn default_push_retry_delay(retry_count: u32) -> Duration {
    push_retry_delay(retry_count, Duration::from_millis(PUSH_RETRY_BASE_DELAY_MS))
}

/// Whether another automatic retry is allowed after `retry_count` retries already ran.
pub fn can_retry(retry_count: u32, max_retries: u32) -> bool {
    retry_count < max_retries
}

/// Default-policy variant of [`can_retry`].
pub fn can_retry_default(retry_count: u32) -> bool {
    can_retry(retry_count, MAX_PUSH_RETRIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_http_status_for_sync_policy() {
        assert_eq!(classify_http_status(401), SyncErrorKind::AuthExpired);
        assert_eq!(classify_http_status(403), SyncErrorKind::AuthExpired);
        assert_eq!(classify_http_status(404), SyncErrorKind::RemoteNotFound);
        assert_eq!(classify_http_status(503), SyncErrorKind::NetworkTransient);
        assert_eq!(classify_http_status(429), SyncErrorKind::NetworkTransient);
        assert_eq!(classify_http_status(400), SyncErrorKind::Unclassified);
    }

    #[test]
    fn auth_message_on_generic_status_is_auth() {
        let err = RemoteCallError::api(400, "invalid_grant: Token has been expired or revoked.");
        assert_eq!(err.classify(), SyncErrorKind::AuthExpired);
        assert_eq!(
            RemoteCallError::api(400, "Unable to parse range").classify(),
            SyncErrorKind::Unclassified
        );
    }

    #[test]
    fn transport_failures_are_transient() {
        assert_eq!(
            RemoteCallError::network("connection reset").classify(),
            SyncErrorKind::NetworkTransient
        );
        assert_eq!(
            RemoteCallError::unauthenticated("no token").classify(),
            SyncErrorKind::AuthExpired
        );
    }

    #[test]
    fn retry_delay_grows_linearly_with_count() {
        assert_eq!(default_push_retry_delay(1), Duration::from_millis(3000));
        assert_eq!(default_push_retry_delay(2), Duration::from_millis(6000));
        assert_eq!(default_push_retry_delay(3), Duration::from_millis(9000));
        assert!(can_retry_default(2));
        assert!(!can_retry_default(3));
    }

    #[test]
    fn not_found_has_a_user_facing_message() {
        let err = RemoteCallError::api(404, "Requested entity was not found.");
        assert_eq!(err.classify(), SyncErrorKind::RemoteNotFound);
        assert!(err.user_message().contains("Spreadsheet not found"));
    }
}
