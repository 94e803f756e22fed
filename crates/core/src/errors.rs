//! Error types shared across the homeledger crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the ledger, the local stores and the sync domain helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// Local durable store failure (read, write or schema).
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ledger record addressed by id does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Caller supplied data that fails validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote rows could not be decoded into ledger records.
    #[error("Codec error in table '{table}' row {row}: {message}")]
    Codec {
        table: &'static str,
        row: usize,
        message: String,
    },

    /// Token acquisition or persistence failed.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl Error {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn codec(table: &'static str, row: usize, message: impl Into<String>) -> Self {
        Self::Codec {
            table,
            row,
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }
}
