use homeledger_core::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::storage(err.to_string())
    }
}
