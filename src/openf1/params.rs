use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Query key for the "strictly after this timestamp" filter on telemetry.
pub const DATE_AFTER: &str = "date>";

/// Flat set of query parameters for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, Value>);

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.0.insert(key.to_string(), value.into());
    self
  }

  /// Add `key` only when a value is present.
  pub fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
    match value {
      Some(v) => self.with(key, v),
      None => self,
    }
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Parameters as `(name, value)` pairs for the query string.
  pub fn to_query_pairs(&self) -> Vec<(String, String)> {
    self
      .0
      .iter()
      .map(|(k, v)| {
        let value = match v {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        (k.clone(), value)
      })
      .collect()
  }
}

impl std::fmt::Display for QueryParams {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let pairs: Vec<String> = self
      .to_query_pairs()
      .into_iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    write!(f, "{{{}}}", pairs.join(", "))
  }
}
