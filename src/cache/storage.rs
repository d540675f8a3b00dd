//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::traits::storage_hash;

/// A payload read back from storage.
#[derive(Debug, Clone)]
pub struct StoredPayload {
  pub payload: Value,
  /// When the payload was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for persistent cache backends.
///
/// The in-memory [`super::QueryCache`] always sits in front of the storage;
/// storage only decides whether payloads survive a restart.
pub trait CacheStorage: Send + Sync + 'static {
  /// Get the stored payload for a cache key.
  fn get_payload(&self, key: &str) -> Result<Option<StoredPayload>>;

  /// Store (or replace) the payload for a cache key.
  fn store_payload(&self, key: &str, payload: &Value) -> Result<()>;

  /// Remove a single key.
  fn remove(&self, key: &str) -> Result<()>;

  /// Remove everything.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get_payload(&self, _key: &str) -> Result<Option<StoredPayload>> {
    Ok(None) // Always miss
  }

  fn store_payload(&self, _key: &str, _payload: &Value) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the storage at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("pokedex").join("cache.db"))
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Cache database lock poisoned: {}", e))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS payload_cache (
    key_hash TEXT PRIMARY KEY,
    cache_key TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

impl CacheStorage for SqliteStorage {
  fn get_payload(&self, key: &str) -> Result<Option<StoredPayload>> {
    let conn = self.conn()?;

    let mut stmt = conn
      .prepare("SELECT data, cached_at FROM payload_cache WHERE key_hash = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![storage_hash(key)], |row| Ok((row.get(0)?, row.get(1)?)))
      .optional()
      .map_err(|e| eyre!("Failed to read payload for {}: {}", key, e))?;

    let Some((data, cached_at)) = row else {
      return Ok(None);
    };
    let payload = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Failed to deserialize payload for {}: {}", key, e))?;
    Ok(Some(StoredPayload {
      payload,
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn store_payload(&self, key: &str, payload: &Value) -> Result<()> {
    let conn = self.conn()?;
    let data =
      serde_json::to_vec(payload).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO payload_cache (key_hash, cache_key, data, cached_at)
         VALUES (?, ?, ?, ?)",
        params![storage_hash(key), key, data, Utc::now().to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to store payload: {}", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute(
        "DELETE FROM payload_cache WHERE key_hash = ?",
        params![storage_hash(key)],
      )
      .map_err(|e| eyre!("Failed to remove payload: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.conn()?;

    conn
      .execute("DELETE FROM payload_cache", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
