use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local session category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
  Practice,
  Qualifying,
  Sprint,
  Race,
}

impl SessionType {
  pub const ALL: [SessionType; 4] = [
    SessionType::Practice,
    SessionType::Qualifying,
    SessionType::Sprint,
    SessionType::Race,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      SessionType::Practice => "practice",
      SessionType::Qualifying => "qualifying",
      SessionType::Sprint => "sprint",
      SessionType::Race => "race",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
  }
}

impl std::fmt::Display for SessionType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for SessionType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| {
      format!(
        "unknown session type '{}' (expected practice, qualifying, sprint or race)",
        s
      )
    })
  }
}

/// A racing session, unique by `session_key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
  pub session_key: i64,
  pub meeting_key: i64,
  pub session_name: String,
  pub session_type: SessionType,
  pub circuit_name: String,
  pub circuit_short_name: String,
  pub country_name: String,
  pub country_code: String,
  pub date_start: DateTime<Utc>,
  pub date_end: Option<DateTime<Utc>>,
  pub year: i32,
  /// Set by live tracking, never by sync
  pub is_live: bool,
}

impl Session {
  /// True when `now` falls inside a closed `[date_start, date_end]` window.
  pub fn window_contains(&self, now: DateTime<Utc>) -> bool {
    match self.date_end {
      Some(end) => self.date_start <= now && now <= end,
      None => false,
    }
  }
}

impl std::fmt::Display for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} {} - {}",
      self.year, self.circuit_short_name, self.session_name
    )
  }
}

/// A driver, unique by car number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
  pub driver_number: i64,
  pub full_name: String,
  pub name_acronym: String,
  pub team_name: String,
  /// "#RRGGBB"
  pub team_colour: String,
  pub headshot_url: String,
  pub country_code: String,
  pub is_active: bool,
}

impl Driver {
  /// A row with only the key set, the starting point for a first insert.
  pub fn blank(driver_number: i64) -> Self {
    Self {
      driver_number,
      full_name: String::new(),
      name_acronym: String::new(),
      team_name: String::new(),
      team_colour: String::new(),
      headshot_url: String::new(),
      country_code: String::new(),
      is_active: true,
    }
  }
}

impl std::fmt::Display for Driver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "#{} {} ({})",
      self.driver_number, self.name_acronym, self.team_name
    )
  }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
  Created,
  Updated,
}
