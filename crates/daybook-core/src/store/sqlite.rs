//! SQLite-backed key-value store implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

use super::LocalStore;

/// `SQLite` implementation of `LocalStore`
///
/// A single `kv_store` table keyed by string; batched writes run in one
/// transaction so the batch itself is atomic.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StorePoisoned)
    }
}

impl LocalStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = statement
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            rows.push(((*key).to_string(), value));
        }
        Ok(rows)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    async fn set_many(&self, pairs: &[(String, String)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut statement =
                tx.prepare("INSERT OR REPLACE INTO kv_store (key, value) VALUES (?1, ?2)")?;
            for (key, value) in pairs {
                statement.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
