//! Storage for named cache generations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
#[cfg(test)]
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use super::response::CachedResponse;
use crate::error::{Error, Result};

/// Trait for generation storage backends.
///
/// A generation is a named set of `key -> response` entries. Generations are
/// created by `open` and dropped as a whole by `delete`.
pub trait GenerationStorage: Send + Sync {
  /// Names of all existing generations, sorted.
  fn names(&self) -> Result<Vec<String>>;

  /// Create the generation if it does not exist yet.
  fn open(&self, name: &str) -> Result<()>;

  fn exists(&self, name: &str) -> Result<bool> {
    Ok(self.names()?.iter().any(|n| n == name))
  }

  /// Drop a generation and everything in it. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>>;

  /// Store one response, replacing any previous one under `key`.
  ///
  /// Never creates a generation: if `name` is gone (deleted by a newer
  /// activation while the request was in flight) nothing is stored and
  /// `false` is returned.
  fn put(&self, name: &str, key: &str, response: &CachedResponse) -> Result<bool>;

  /// Store all entries or none of them, creating the generation if needed.
  fn put_all(&self, name: &str, entries: &[(String, CachedResponse)]) -> Result<()>;

  /// Keys stored in a generation, sorted.
  fn keys(&self, name: &str) -> Result<Vec<String>>;
}

/// In-process generation storage.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryGenerations {
  generations: Mutex<BTreeMap<String, BTreeMap<String, CachedResponse>>>,
}

#[cfg(test)]
impl MemoryGenerations {
  pub fn new() -> Self {
    Self::default()
  }
}

#[cfg(test)]
impl GenerationStorage for MemoryGenerations {
  fn names(&self) -> Result<Vec<String>> {
    Ok(self.generations.lock()?.keys().cloned().collect())
  }

  fn open(&self, name: &str) -> Result<()> {
    self
      .generations
      .lock()?
      .entry(name.to_string())
      .or_default();
    Ok(())
  }

  fn delete(&self, name: &str) -> Result<bool> {
    Ok(self.generations.lock()?.remove(name).is_some())
  }

  fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
    Ok(
      self
        .generations
        .lock()?
        .get(name)
        .and_then(|entries| entries.get(key))
        .cloned(),
    )
  }

  fn put(&self, name: &str, key: &str, response: &CachedResponse) -> Result<bool> {
    match self.generations.lock()?.get_mut(name) {
      Some(generation) => {
        generation.insert(key.to_string(), response.clone());
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn put_all(&self, name: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
    let mut generations = self.generations.lock()?;
    let generation = generations.entry(name.to_string()).or_default();
    for (key, response) in entries {
      generation.insert(key.clone(), response.clone());
    }
    Ok(())
  }

  fn keys(&self, name: &str) -> Result<Vec<String>> {
    Ok(
      self
        .generations
        .lock()?
        .get(name)
        .map(|entries| entries.keys().cloned().collect())
        .unwrap_or_default(),
    )
  }
}

/// SQLite-based generation storage.
pub struct SqliteGenerations {
  conn: Mutex<Connection>,
}

impl SqliteGenerations {
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("Failed to create asset cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "Failed to open asset cache at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(GENERATION_SCHEMA)
      .map_err(|e| Error::Storage(format!("Failed to run asset cache migrations: {}", e)))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn insert(conn: &Connection, name: &str, key: &str, response: &CachedResponse) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)?;
    conn.execute(
      "INSERT OR REPLACE INTO responses (generation, key, url, status, headers, body, stored_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        name,
        key,
        response.url,
        response.status,
        headers,
        response.body,
        response.stored_at.to_rfc3339()
      ],
    )?;
    Ok(())
  }
}

/// Schema for generation tables.
const GENERATION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS responses (
    generation TEXT NOT NULL,
    key TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (generation, key)
);
"#;

impl GenerationStorage for SqliteGenerations {
  fn names(&self) -> Result<Vec<String>> {
    let conn = self.conn.lock()?;
    let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY name")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
  }

  fn open(&self, name: &str) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute(
      "INSERT OR IGNORE INTO generations (name) VALUES (?)",
      params![name],
    )?;
    Ok(())
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM responses WHERE generation = ?", params![name])?;
    let removed = tx.execute("DELETE FROM generations WHERE name = ?", params![name])?;
    tx.commit()?;
    Ok(removed > 0)
  }

  fn lookup(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
    let conn = self.conn.lock()?;
    let row: Option<(String, u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT url, status, headers, body, stored_at FROM responses
         WHERE generation = ? AND key = ?",
        params![name, key],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
          ))
        },
      )
      .optional()?;

    match row {
      Some((url, status, headers, body, stored_at)) => Ok(Some(CachedResponse {
        url,
        status,
        headers: serde_json::from_str(&headers)?,
        body,
        stored_at: parse_datetime(&stored_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, name: &str, key: &str, response: &CachedResponse) -> Result<bool> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    let exists = tx
      .query_row(
        "SELECT 1 FROM generations WHERE name = ?",
        params![name],
        |_| Ok(()),
      )
      .optional()?
      .is_some();
    if !exists {
      return Ok(false);
    }
    Self::insert(&tx, name, key, response)?;
    tx.commit()?;
    Ok(true)
  }

  fn put_all(&self, name: &str, entries: &[(String, CachedResponse)]) -> Result<()> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    tx.execute(
      "INSERT OR IGNORE INTO generations (name) VALUES (?)",
      params![name],
    )?;
    for (key, response) in entries {
      Self::insert(&tx, name, key, response)?;
    }
    tx.commit()?;
    Ok(())
  }

  fn keys(&self, name: &str) -> Result<Vec<String>> {
    let conn = self.conn.lock()?;
    let mut stmt = conn.prepare("SELECT key FROM responses WHERE generation = ? ORDER BY key")?;
    let keys = stmt
      .query_map(params![name], |row| row.get(0))?
      .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(keys)
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Storage(format!("Failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(body: &str) -> CachedResponse {
    CachedResponse::new("http://localhost:8000/index.html", 200, body)
      .with_header("Content-Type", "text/html")
  }

  fn check_generations<G: GenerationStorage>(storage: &G) {
    storage.open("restaurant-static-v1").unwrap();
    storage.open("restaurant-static-v1").unwrap();
    assert_eq!(storage.names().unwrap(), vec!["restaurant-static-v1"]);
    assert!(storage.keys("restaurant-static-v1").unwrap().is_empty());

    storage
      .put_all(
        "restaurant-static-v1",
        &[
          ("a".to_string(), response("one")),
          ("b".to_string(), response("two")),
        ],
      )
      .unwrap();
    assert!(!storage
      .put("restaurant-static-v2", "a", &response("fresh"))
      .unwrap());
    assert!(!storage.exists("restaurant-static-v2").unwrap());
    storage.open("restaurant-static-v2").unwrap();
    assert!(storage
      .put("restaurant-static-v2", "a", &response("fresh"))
      .unwrap());

    assert_eq!(
      storage.names().unwrap(),
      vec!["restaurant-static-v1", "restaurant-static-v2"]
    );
    assert_eq!(storage.keys("restaurant-static-v1").unwrap(), vec!["a", "b"]);

    let hit = storage.lookup("restaurant-static-v1", "a").unwrap().unwrap();
    assert_eq!(hit.body, b"one");
    assert_eq!(hit.status, 200);
    assert_eq!(hit.header("content-type"), Some("text/html"));
    assert!(storage.lookup("restaurant-static-v1", "zzz").unwrap().is_none());

    assert!(storage
      .put("restaurant-static-v1", "a", &response("replaced"))
      .unwrap());
    let hit = storage.lookup("restaurant-static-v1", "a").unwrap().unwrap();
    assert_eq!(hit.body, b"replaced");

    assert!(storage.delete("restaurant-static-v1").unwrap());
    assert!(!storage.delete("restaurant-static-v1").unwrap());
    assert!(!storage.exists("restaurant-static-v1").unwrap());
    assert!(storage.lookup("restaurant-static-v1", "b").unwrap().is_none());
    assert_eq!(
      storage.lookup("restaurant-static-v2", "a").unwrap().unwrap().body,
      b"fresh"
    );
  }

  #[test]
  fn test_memory_generations() {
    check_generations(&MemoryGenerations::new());
  }

  #[test]
  fn test_sqlite_generations() {
    check_generations(&SqliteGenerations::in_memory().unwrap());
  }

  #[test]
  fn test_sqlite_round_trips_timestamp() {
    let storage = SqliteGenerations::in_memory().unwrap();
    let stored = response("x");
    storage.open("g").unwrap();
    assert!(storage.put("g", "k", &stored).unwrap());
    let loaded = storage.lookup("g", "k").unwrap().unwrap();
    assert_eq!(loaded, stored);
  }
}
