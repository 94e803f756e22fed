//! Seams between the sync engine and the outside world.

use async_trait::async_trait;

use super::ledger_sync_model::{RemoteLinkConfig, RemoteTarget};
use super::ledger_sync_policy::RemoteCallError;
use crate::ledger::TableRow;
use crate::secrets::AccessToken;

/// Row-oriented access to the remote spreadsheet.
#[async_trait]
pub trait RemoteTableClient: Send + Sync {
    /// Read every row of `table`, header included. A missing or blank table reads as empty.
    async fn read_table(
        &self,
        target: &RemoteTarget,
        table: &str,
    ) -> Result<Vec<TableRow>, RemoteCallError>;

    /// Read several tables in one round trip, in the order given.
    async fn read_tables(
        &self,
        target: &RemoteTarget,
        tables: &[&str],
    ) -> Result<Vec<Vec<TableRow>>, RemoteCallError>;

    /// Replace the contents of `table`: clear it, then write `rows` from the first cell.
    async fn write_table(
        &self,
        target: &RemoteTarget,
        table: &str,
        rows: Vec<TableRow>,
    ) -> Result<(), RemoteCallError>;

    async fn clear_table(&self, target: &RemoteTarget, table: &str)
        -> Result<(), RemoteCallError>;
}

/// Obtains access tokens for a remote link.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// May involve the user (consent screen, code entry).
    async fn acquire_interactive(
        &self,
        config: &RemoteLinkConfig,
    ) -> Result<AccessToken, RemoteCallError>;

    /// Never involves the user. Fails with an auth-classified error when consent is needed.
    async fn acquire_silent(
        &self,
        config: &RemoteLinkConfig,
    ) -> Result<AccessToken, RemoteCallError>;
}
