//! Error types for the Sheets sync crate.

use homeledger_core::sync::{RemoteCallError, SyncErrorKind};
use thiserror::Error;

/// Result type alias for Sheets sync operations.
pub type Result<T> = std::result::Result<T, SheetsSyncError>;

/// Errors that can occur while talking to the Sheets or OAuth endpoints.
#[derive(Debug, Error)]
pub enum SheetsSyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the remote API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl SheetsSyncError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport-neutral form consumed by the sync engine.
    pub fn to_remote_error(&self) -> RemoteCallError {
        match self {
            Self::Http(inner) if inner.is_decode() => RemoteCallError::Decode(inner.to_string()),
            Self::Http(inner) => RemoteCallError::network(inner.to_string()),
            Self::Json(inner) => RemoteCallError::Decode(inner.to_string()),
            Self::Api { status, message } => RemoteCallError::api(*status, message.clone()),
            Self::InvalidRequest(message) => RemoteCallError::api(400, message.clone()),
            Self::Auth(message) => RemoteCallError::unauthenticated(message.clone()),
        }
    }

    /// Classify error for the sync status machine.
    pub fn error_kind(&self) -> SyncErrorKind {
        self.to_remote_error().classify()
    }
}

impl From<SheetsSyncError> for RemoteCallError {
    fn from(err: SheetsSyncError) -> Self {
        err.to_remote_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_for_sheets_statuses() {
        assert_eq!(
            SheetsSyncError::api(401, "Request had invalid authentication credentials.")
                .error_kind(),
            SyncErrorKind::AuthExpired
        );
        assert_eq!(
            SheetsSyncError::api(404, "Requested entity was not found.").error_kind(),
            SyncErrorKind::RemoteNotFound
        );
        assert_eq!(
            SheetsSyncError::api(503, "The service is currently unavailable.").error_kind(),
            SyncErrorKind::NetworkTransient
        );
        assert_eq!(
            SheetsSyncError::api(400, "Unable to parse range: transactions!A1").error_kind(),
            SyncErrorKind::Unclassified
        );
    }

    #[test]
    fn invalid_grant_is_auth_even_on_bad_request() {
        let err = SheetsSyncError::api(400, "invalid_grant: Token has been expired or revoked.");
        assert_eq!(err.error_kind(), SyncErrorKind::AuthExpired);
    }

    #[test]
    fn conversion_keeps_status_and_message() {
        let converted: RemoteCallError = SheetsSyncError::api(404, "not found").into();
        assert_eq!(converted, RemoteCallError::api(404, "not found"));

        let converted: RemoteCallError = SheetsSyncError::auth("no token").into();
        assert_eq!(converted.classify(), SyncErrorKind::AuthExpired);
    }
}
