use homeledger_core::sync::RemoteCallError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncEngineError>;

#[derive(Debug, Error)]
pub enum SyncEngineError {
    #[error("Client ID, API key and spreadsheet ID are all required")]
    IncompleteConfig,

    #[error("Sync is not connected")]
    NotLinked,

    #[error("Could not obtain credentials: {0}")]
    Credential(#[source] RemoteCallError),

    #[error(transparent)]
    Core(#[from] homeledger_core::Error),

    #[error("Sync engine must be created inside a Tokio runtime")]
    NoRuntime,
}
