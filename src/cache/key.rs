//! Deterministic cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of the hex digest kept in a key
const HASH_LEN: usize = 12;

/// Build the cache key for a request to `endpoint` with `params`.
///
/// The parameters go through `serde_json::Value`, whose maps keep their keys
/// sorted, so two parameter sets with the same entries produce the same key
/// no matter what order they were inserted in.
pub fn build_key<P: Serialize>(endpoint: &str, params: &P) -> String {
  let canonical = serde_json::to_value(params)
    .map(|v| v.to_string())
    .unwrap_or_default();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  let digest = hex::encode(hasher.finalize());

  format!(
    "f1:{}:{}",
    endpoint.trim_matches('/'),
    &digest[..HASH_LEN]
  )
}
