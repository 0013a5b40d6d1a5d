//! Cache backends: SQLite, in-process memory, and a no-op.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::{CacheBackend, CacheError};

/// Open the backend named by a connection string.
///
/// - `none` or empty: caching disabled
/// - `memory://`: process-local map
/// - `sqlite::memory:`: in-memory SQLite
/// - `sqlite://<path>` or a bare path: SQLite file
pub fn open_backend(url: &str) -> Result<Box<dyn CacheBackend>, CacheError> {
  let url = url.trim();
  match url {
    "" | "none" => Ok(Box::new(NoopStorage)),
    "memory://" => Ok(Box::new(MemoryCache::new())),
    "sqlite::memory:" => Ok(Box::new(SqliteCache::open_in_memory()?)),
    _ => {
      if let Some(path) = url.strip_prefix("sqlite://") {
        Ok(Box::new(SqliteCache::open(Path::new(path))?))
      } else if url.contains("://") {
        Err(CacheError::UnsupportedUrl(url.to_string()))
      } else {
        Ok(Box::new(SqliteCache::open(Path::new(url))?))
      }
    }
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

#[async_trait]
impl CacheBackend for NoopStorage {
  async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
    Ok(None) // Always miss
  }

  async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
    Ok(()) // Discard
  }

  fn name(&self) -> &'static str {
    "none"
  }
}

/// In-process cache. Entries live as long as the owning client.
#[derive(Default)]
pub struct MemoryCache {
  entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CacheBackend for MemoryCache {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
    let entries = self.entries.read().await;
    Ok(
      entries
        .get(key)
        .filter(|(_, expires_at)| Instant::now() < *expires_at)
        .map(|(value, _)| value.clone()),
    )
  }

  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
    let mut entries = self.entries.write().await;
    let now = Instant::now();
    entries.retain(|_, (_, expires_at)| now < *expires_at);
    entries.insert(key.to_string(), (value.to_string(), now + ttl));
    Ok(())
  }

  fn name(&self) -> &'static str {
    "memory"
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteCache {
  conn: Mutex<Option<Connection>>,
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_response_cache_expiry ON response_cache(expires_at);
"#;

impl SqliteCache {
  /// Open or create a cache database at `path`.
  pub fn open(path: &Path) -> Result<Self, CacheError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    Self::init(Connection::open(path)?)
  }

  pub fn open_in_memory() -> Result<Self, CacheError> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> Result<Self, CacheError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(Some(conn)),
    })
  }

  fn with_conn<T>(
    &self,
    f: impl FnOnce(&Connection) -> Result<T, CacheError>,
  ) -> Result<T, CacheError> {
    let guard = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
    let conn = guard.as_ref().ok_or(CacheError::Closed)?;
    f(conn)
  }
}

#[async_trait]
impl CacheBackend for SqliteCache {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
    let now = Utc::now().timestamp_millis();
    self.with_conn(|conn| {
      let payload = conn
        .query_row(
          "SELECT payload FROM response_cache WHERE cache_key = ? AND expires_at > ?",
          params![key, now],
          |row| row.get(0),
        )
        .optional()?;
      Ok(payload)
    })
  }

  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
    let now = Utc::now().timestamp_millis();
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let expires_at = now.saturating_add(ttl_ms);

    self.with_conn(|conn| {
      conn.execute(
        "DELETE FROM response_cache WHERE expires_at <= ?",
        params![now],
      )?;
      conn.execute(
        "INSERT OR REPLACE INTO response_cache (cache_key, payload, expires_at, cached_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![key, value, expires_at],
      )?;
      Ok(())
    })
  }

  async fn close(&self) -> Result<(), CacheError> {
    let mut guard = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
    if let Some(conn) = guard.take() {
      conn.close().map_err(|(_, e)| CacheError::Sqlite(e))?;
    }
    Ok(())
  }

  fn name(&self) -> &'static str {
    "sqlite"
  }
}
