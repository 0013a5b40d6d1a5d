//! Cache layer that orchestrates caching logic with network fetching.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{CacheBackend, CacheResult};

/// How fast a response goes out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
  /// Finished sessions, rosters and other slow-changing data
  Historical,
  /// Data that changes while a session is running
  Live,
}

/// TTL for each volatility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
  pub live: Duration,
  pub historical: Duration,
}

impl Default for TtlPolicy {
  fn default() -> Self {
    Self {
      live: Duration::from_secs(5),
      historical: Duration::from_secs(3600),
    }
  }
}

impl TtlPolicy {
  pub fn ttl_for(&self, volatility: Volatility) -> Duration {
    match volatility {
      Volatility::Live => self.live,
      Volatility::Historical => self.historical,
    }
  }
}

/// Cache layer that manages caching logic and network fetching.
///
/// Backend failures never escape this type: a failed read is a miss and a
/// failed write is dropped, both with a warning. A broken cache therefore
/// cannot stop a fetch from succeeding.
pub struct CacheLayer {
  backend: Box<dyn CacheBackend>,
  ttl: TtlPolicy,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(backend: Box<dyn CacheBackend>, ttl: TtlPolicy) -> Self {
    Self { backend, ttl }
  }

  /// Look up `key`. Backend errors and undecodable entries count as a miss.
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = match self.backend.get(key).await {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, backend = self.backend.name(), error = %e, "Cache read failed");
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "Discarding undecodable cache entry");
        None
      }
    }
  }

  /// Store `value` under `key` for `ttl`. Failures are logged and dropped.
  pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
    let payload = match serde_json::to_string(value) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(key, error = %e, "Cache write skipped, payload not serializable");
        return;
      }
    };

    if let Err(e) = self.backend.set_ex(key, &payload, ttl).await {
      warn!(key, backend = self.backend.name(), error = %e, "Cache write failed");
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - on a hit, return immediately without calling `fetcher`
  /// 2. On a miss, run `fetcher`
  /// 3. Store a successful result under the TTL for `volatility`
  ///
  /// Errors from `fetcher` are returned untouched and nothing is cached.
  pub async fn fetch<T, E, F, Fut>(
    &self,
    key: &str,
    volatility: Volatility,
    fetcher: F,
  ) -> Result<CacheResult<T>, E>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    if let Some(cached) = self.get::<T>(key).await {
      debug!(key, "Cache hit");
      return Ok(CacheResult::from_cache(cached));
    }

    let data = fetcher().await?;
    self.set(key, &data, self.ttl.ttl_for(volatility)).await;
    Ok(CacheResult::from_network(data))
  }

  /// Release the backend connection.
  pub async fn close(self) {
    if let Err(e) = self.backend.close().await {
      warn!(backend = self.backend.name(), error = %e, "Cache close failed");
    }
  }
}
