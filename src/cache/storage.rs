//! Record store trait and SQLite implementation.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
#[cfg(test)]
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Durable key-value persistence for structured records.
///
/// Values are stored as JSON and replaced wholesale on every `set`.
pub trait RecordStore: Send + Sync {
  /// Read the value under `key`. `None` means nothing was ever stored.
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

  /// Replace the value under `key`.
  fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()>;
}

/// In-process store, lost when the process exits. Clones share one map.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MemoryStorage {
  values: std::sync::Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[cfg(test)]
impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

#[cfg(test)]
impl RecordStore for MemoryStorage {
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let values = self.values.lock()?;
    match values.get(key) {
      Some(data) => Ok(Some(serde_json::from_slice(data)?)),
      None => Ok(None),
    }
  }

  fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let data = serde_json::to_vec(value)?;
    self.values.lock()?.insert(key.to_string(), data);
    Ok(())
  }
}

/// SQLite-based record store.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("Failed to create store directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "Failed to open record store at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock()?;
    conn
      .execute_batch(RECORD_SCHEMA)
      .map_err(|e| Error::Storage(format!("Failed to run record store migrations: {}", e)))?;
    Ok(())
  }
}

const RECORD_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl RecordStore for SqliteStorage {
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let conn = self.conn.lock()?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT value FROM records WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;

    match data {
      Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
      None => Ok(None),
    }
  }

  fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let data = serde_json::to_vec(value)?;
    let conn = self.conn.lock()?;

    conn.execute(
      "INSERT OR REPLACE INTO records (key, value, stored_at)
       VALUES (?, ?, datetime('now'))",
      params![key, data],
    )?;
    debug!(key, bytes = data.len(), "Stored record value");

    Ok(())
  }
}
