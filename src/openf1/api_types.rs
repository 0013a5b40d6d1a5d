//! Serde-deserializable views of OpenF1 records.
//!
//! These types are separate from the local models so that missing or null
//! fields in remote records never fail the whole batch.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

/// Decode one raw record into a typed view.
pub fn from_record<T: DeserializeOwned>(record: &Value) -> serde_json::Result<T> {
  T::deserialize(record)
}

/// One entry from `/sessions`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiSession {
  pub session_key: Option<i64>,
  pub meeting_key: Option<i64>,
  pub session_name: Option<String>,
  pub session_type: Option<String>,
  /// Circuit location, e.g. "Sakhir"
  pub location: Option<String>,
  pub circuit_short_name: Option<String>,
  pub country_name: Option<String>,
  pub country_code: Option<String>,
  pub date_start: Option<String>,
  pub date_end: Option<String>,
  pub year: Option<i32>,
}

/// One entry from `/drivers`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiDriver {
  pub driver_number: Option<i64>,
  pub full_name: Option<String>,
  pub name_acronym: Option<String>,
  pub team_name: Option<String>,
  /// Hex colour, usually without the leading '#'
  pub team_colour: Option<String>,
  pub headshot_url: Option<String>,
  pub country_code: Option<String>,
}
