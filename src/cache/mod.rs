//! Response cache for upstream API calls.
//!
//! This module provides an API-agnostic caching mechanism that:
//! - Addresses entries by a key derived from endpoint + sorted parameters
//! - Stores payloads with a TTL chosen by volatility (live vs historical)
//! - Treats every backend failure as a miss, so a cache outage never blocks a fetch

mod key;
mod layer;
mod storage;
mod traits;

pub use key::build_key;
pub use layer::{CacheLayer, TtlPolicy, Volatility};
pub use storage::{open_backend, MemoryCache, NoopStorage, SqliteCache};
pub use traits::{CacheBackend, CacheError, CacheResult, CacheSource};

#[cfg(test)]
pub(crate) use layer::testing;
