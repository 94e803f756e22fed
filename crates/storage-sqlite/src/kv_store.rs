//! SQLite-backed local durable cache and secret store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use homeledger_core::secrets::SecretStore;
use homeledger_core::storage::KeyValueStore;
use homeledger_core::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;
use crate::errors::StorageError;

/// One connection guarded by a mutex. Calls are short single-row statements.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = db::open(path.as_ref())?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
        })
    }

    fn connection(&self) -> std::result::Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn get_from(&self, table: Table, key: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(table.select_sql(), params![key], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }

    fn set_in(&self, table: Table, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(table.upsert_sql(), params![key, value])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn delete_from(&self, table: Table, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(table.delete_sql(), params![key])
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Table {
    Kv,
    Secrets,
}

impl Table {
    fn select_sql(self) -> &'static str {
        match self {
            Self::Kv => "SELECT value FROM app_kv WHERE key = ?1",
            Self::Secrets => "SELECT value FROM app_secrets WHERE key = ?1",
        }
    }

    fn upsert_sql(self) -> &'static str {
        match self {
            Self::Kv => {
                "INSERT INTO app_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')"
            }
            Self::Secrets => {
                "INSERT INTO app_secrets (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            }
        }
    }

    fn delete_sql(self) -> &'static str {
        match self {
            Self::Kv => "DELETE FROM app_kv WHERE key = ?1",
            Self::Secrets => "DELETE FROM app_secrets WHERE key = ?1",
        }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_from(Table::Kv, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_in(Table::Kv, key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.delete_from(Table::Kv, key)
    }
}

impl SecretStore for SqliteKeyValueStore {
    fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.set_in(Table::Secrets, key, value)
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        self.get_from(Table::Secrets, key)
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        self.delete_from(Table::Secrets, key)
    }
}
