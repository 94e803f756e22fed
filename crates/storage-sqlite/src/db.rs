//! Connection setup and schema.

use std::path::Path;

use log::debug;
use rusqlite::Connection;

use crate::errors::StorageError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS app_kv (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE TABLE IF NOT EXISTS app_secrets (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
";

fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;
    Ok(())
}

/// Open (creating if needed) the database at `path` and bring the schema up to date.
pub fn open(path: &Path) -> Result<Connection, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;
    conn.execute_batch(SCHEMA)?;
    debug!("[Storage] Opened {}", path.display());
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}
