//! Core traits and types for the caching system.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a cache backend.
///
/// These never leave the cache layer: they are logged and treated as a miss
/// (reads) or a dropped write.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to prepare cache location: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache lock poisoned")]
  LockPoisoned,

  #[error("cache connection already closed")]
  Closed,

  #[error("invalid cached payload: {0}")]
  Payload(#[from] serde_json::Error),

  #[error("unsupported cache url: {0}")]
  UnsupportedUrl(String),
}

/// Key/value backend with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
  /// Get the value stored under `key`, or `None` when absent or expired.
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

  /// Store `value` under `key` for `ttl`.
  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

  /// Release the underlying connection.
  async fn close(&self) -> Result<(), CacheError> {
    Ok(())
  }

  /// Backend name for logs.
  fn name(&self) -> &'static str;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Unexpired entry from the cache backend
  Cache,
}
