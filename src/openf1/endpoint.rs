/// Upstream resources exposed by the OpenF1 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
  Sessions,
  Drivers,
  CarData,
  Laps,
  Position,
  Intervals,
  Pit,
  Stints,
  Weather,
  RaceControl,
  TeamRadio,
  Overtakes,
}

impl Endpoint {
  /// Path relative to the API base URL.
  pub fn path(self) -> &'static str {
    match self {
      Self::Sessions => "sessions",
      Self::Drivers => "drivers",
      Self::CarData => "car_data",
      Self::Laps => "laps",
      Self::Position => "position",
      Self::Intervals => "intervals",
      Self::Pit => "pit",
      Self::Stints => "stints",
      Self::Weather => "weather",
      Self::RaceControl => "race_control",
      Self::TeamRadio => "team_radio",
      Self::Overtakes => "overtakes",
    }
  }

  /// Resources that change continuously during a session, whatever the filter.
  pub fn is_inherently_live(self) -> bool {
    matches!(self, Self::Position | Self::Intervals)
  }
}

impl std::fmt::Display for Endpoint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "/{}", self.path())
  }
}
