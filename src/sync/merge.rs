//! Turning remote records into local rows.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use crate::models::{Driver, Session, SessionType};
use crate::openf1::api_types::{ApiDriver, ApiSession};

/// Upstream `session_type` values and their local type.
const SESSION_TYPE_MAP: &[(&str, SessionType)] = &[
  ("practice", SessionType::Practice),
  ("qualifying", SessionType::Qualifying),
  ("sprint", SessionType::Sprint),
  ("sprint qualifying", SessionType::Qualifying),
  ("sprint shootout", SessionType::Qualifying),
  ("race", SessionType::Race),
];

/// Substrings of a driver's full name that mark a non-racing car.
const NON_RACING_MARKERS: &[&str] = &["safety car", "medical car", "test car"];

/// Offset-less form some upstream records carry
const NAIVE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.f";

const MAX_CIRCUIT_SHORT_NAME: usize = 20;
const MAX_CODE: usize = 3;
const MAX_COLOUR: usize = 7;

/// Why a remote record was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  MissingKey,
  MissingStart,
  Malformed(String),
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SkipReason::MissingKey => f.write_str("no external key"),
      SkipReason::MissingStart => f.write_str("no parseable date_start"),
      SkipReason::Malformed(e) => write!(f, "malformed record: {}", e),
    }
  }
}

/// Resolve the local session type.
///
/// Sprint races come through with the same upstream type as a full race,
/// so the session name takes precedence:
/// - name exactly "sprint" is a sprint
/// - a sprint name that also says "qualifying" or "shootout" is qualifying
///
/// Otherwise the upstream type is looked up, with unknown values as practice.
pub fn resolve_session_type(session_name: &str, api_type: &str) -> SessionType {
  let name = session_name.trim().to_lowercase();
  if name == "sprint" {
    return SessionType::Sprint;
  }
  if name.contains("sprint") && (name.contains("qualifying") || name.contains("shootout")) {
    return SessionType::Qualifying;
  }

  let api_type = api_type.trim().to_lowercase();
  SESSION_TYPE_MAP
    .iter()
    .find(|(upstream, _)| *upstream == api_type)
    .map(|(_, local)| *local)
    .unwrap_or(SessionType::Practice)
}

/// Merge one text field.
///
/// Precedence: a non-blank incoming value wins; an absent or blank (empty
/// after trimming) incoming value keeps the existing one. Only text is merged this way. Flags such as
/// `is_active` are always assigned outright and never pass through here.
pub fn merge_field(existing: &str, incoming: Option<&str>) -> String {
  match incoming {
    Some(value) if !value.trim().is_empty() => value.to_string(),
    _ => existing.to_string(),
  }
}

/// Safety, medical and test cars appear in the roster but never race.
pub fn is_non_racing(full_name: &str) -> bool {
  let name = full_name.to_lowercase();
  NON_RACING_MARKERS.iter().any(|marker| name.contains(marker))
}

/// "3671C6" -> "#3671C6"; empty stays empty.
pub fn normalize_colour(raw: &str) -> String {
  let raw = raw.trim();
  if raw.is_empty() {
    return String::new();
  }
  let colour = if raw.starts_with('#') {
    raw.to_string()
  } else {
    format!("#{}", raw)
  };
  truncate_chars(&colour, MAX_COLOUR).to_string()
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Lenient timestamp parse; unparseable values are treated as absent.
///
/// RFC 3339 with an offset is preferred. A bare `YYYY-MM-DDTHH:MM:SS[.f]`
/// is read as UTC.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
  let value = value?.trim();
  if value.is_empty() {
    return None;
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(value, NAIVE_TIMESTAMP)
    .map(|naive| naive.and_utc())
    .ok()
}

/// Build the local session row for a remote record.
///
/// Every field is taken from the remote side; `is_live` starts false and is
/// left to the caller to carry over from an existing row.
pub fn session_from_remote(remote: &ApiSession) -> Result<Session, SkipReason> {
  let session_key = remote
    .session_key
    .filter(|k| *k != 0)
    .ok_or(SkipReason::MissingKey)?;
  let date_start =
    parse_timestamp(remote.date_start.as_deref()).ok_or(SkipReason::MissingStart)?;

  let text = |v: &Option<String>| v.as_deref().unwrap_or_default().to_string();
  let session_name = text(&remote.session_name);

  Ok(Session {
    session_key,
    meeting_key: remote.meeting_key.unwrap_or(0),
    session_type: resolve_session_type(
      &session_name,
      remote.session_type.as_deref().unwrap_or_default(),
    ),
    session_name,
    circuit_name: text(&remote.location),
    circuit_short_name: truncate_chars(
      remote.circuit_short_name.as_deref().unwrap_or_default(),
      MAX_CIRCUIT_SHORT_NAME,
    )
    .to_string(),
    country_name: text(&remote.country_name),
    country_code: truncate_chars(remote.country_code.as_deref().unwrap_or_default(), MAX_CODE)
      .to_string(),
    date_start,
    date_end: parse_timestamp(remote.date_end.as_deref()),
    year: remote.year.unwrap_or_else(|| date_start.year()),
    is_live: false,
  })
}

/// The driver number of a remote record, if it has a usable one.
pub fn driver_number(remote: &ApiDriver) -> Result<i64, SkipReason> {
  remote
    .driver_number
    .filter(|n| *n != 0)
    .ok_or(SkipReason::MissingKey)
}

/// Merge a remote driver record over the existing row (or a blank one).
///
/// Text fields follow [`merge_field`]. `is_active` is recomputed from the
/// merged name on every sync so it tracks the current roster.
pub fn merge_driver(driver_number: i64, existing: Option<&Driver>, remote: &ApiDriver) -> Driver {
  let base = existing
    .cloned()
    .unwrap_or_else(|| Driver::blank(driver_number));

  let colour = remote.team_colour.as_deref().map(normalize_colour);
  let acronym = remote
    .name_acronym
    .as_deref()
    .map(|s| truncate_chars(s, MAX_CODE));
  let country = remote
    .country_code
    .as_deref()
    .map(|s| truncate_chars(s, MAX_CODE));

  let full_name = merge_field(&base.full_name, remote.full_name.as_deref());
  let is_active = !is_non_racing(&full_name);

  Driver {
    driver_number,
    name_acronym: merge_field(&base.name_acronym, acronym),
    team_name: merge_field(&base.team_name, remote.team_name.as_deref()),
    team_colour: merge_field(&base.team_colour, colour.as_deref()),
    headshot_url: merge_field(&base.headshot_url, remote.headshot_url.as_deref()),
    country_code: merge_field(&base.country_code, country),
    full_name,
    is_active,
  }
}
