use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{SessionFilter, Store, StoreError};
use crate::models::{Session, SessionType, Upsert};
use crate::openf1::api_types::{from_record, ApiDriver, ApiSession};
use crate::openf1::{ClientError, ClientSettings, OpenF1Client};

use super::merge::{driver_number, merge_driver, session_from_remote, SkipReason};

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("OpenF1 API unavailable: {0}")]
  Api(#[from] ClientError),

  #[error("local storage failed: {0}")]
  Store(#[from] StoreError),
}

/// Outcome counts of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
  pub created: u32,
  pub updated: u32,
  /// Remote records without a usable key
  pub skipped: u32,
}

impl SyncCounts {
  fn record(&mut self, outcome: Upsert) {
    match outcome {
      Upsert::Created => self.created += 1,
      Upsert::Updated => self.updated += 1,
    }
  }
}

impl std::fmt::Display for SyncCounts {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} created, {} updated", self.created, self.updated)?;
    if self.skipped > 0 {
      write!(f, ", {} skipped", self.skipped)?;
    }
    Ok(())
  }
}

/// Pulls sessions and drivers from OpenF1 into the local store.
///
/// Every sync opens its own client and closes it before returning.
pub struct SessionSyncService<S: Store> {
  store: S,
  settings: ClientSettings,
}

impl<S: Store> SessionSyncService<S> {
  pub fn new(store: S, settings: ClientSettings) -> Self {
    Self { store, settings }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Pull sessions (optionally one season) and create/update local rows.
  pub async fn sync_sessions(&self, year: Option<i32>) -> Result<SyncCounts, SyncError> {
    let client = OpenF1Client::open(&self.settings)?;
    let records = client.get_sessions(year).await;
    client.close().await;
    let records = records?;
    let mut counts = SyncCounts::default();

    for record in &records {
      let session = match decode::<ApiSession>(record).and_then(|r| session_from_remote(&r)) {
        Ok(session) => session,
        Err(reason) => {
          warn!(%reason, "Skipping remote session");
          counts.skipped += 1;
          continue;
        }
      };

      // The live flag belongs to live tracking, so an existing row keeps its own
      let outcome = self.store.upsert_session(session.session_key, &|existing| Session {
        is_live: existing.is_some_and(|e| e.is_live),
        ..session.clone()
      })?;
      counts.record(outcome);
    }

    info!(
      created = counts.created,
      updated = counts.updated,
      skipped = counts.skipped,
      "Session sync complete"
    );
    Ok(counts)
  }

  /// Pull drivers (optionally for one session) and merge them into local rows.
  pub async fn sync_drivers(&self, session_key: Option<i64>) -> Result<SyncCounts, SyncError> {
    let client = OpenF1Client::open(&self.settings)?;
    let records = client.get_drivers(session_key).await;
    client.close().await;
    let records = records?;
    let mut counts = SyncCounts::default();

    for record in &records {
      let parsed = decode::<ApiDriver>(record).and_then(|r| Ok((driver_number(&r)?, r)));
      let (number, remote) = match parsed {
        Ok(parsed) => parsed,
        Err(reason) => {
          warn!(%reason, "Skipping remote driver");
          counts.skipped += 1;
          continue;
        }
      };

      let outcome = self.store.upsert_driver(number, &|existing| {
        merge_driver(number, existing, &remote)
      })?;
      counts.record(outcome);
    }

    info!(
      created = counts.created,
      updated = counts.updated,
      skipped = counts.skipped,
      "Driver sync complete"
    );
    Ok(counts)
  }

  /// Local sessions for a season, optionally of one type. No network access.
  pub fn get_available_sessions(
    &self,
    year: i32,
    session_type: Option<SessionType>,
  ) -> Result<Vec<Session>, StoreError> {
    self.store.sessions(&SessionFilter {
      year: Some(year),
      session_type,
      ..SessionFilter::default()
    })
  }

  /// The session flagged live whose window contains the current time, if any.
  pub fn detect_live_session(&self) -> Result<Option<Session>, StoreError> {
    self.detect_live_session_at(Utc::now())
  }

  pub fn detect_live_session_at(&self, now: DateTime<Utc>) -> Result<Option<Session>, StoreError> {
    let sessions = self.store.sessions(&SessionFilter {
      live_at: Some(now),
      ..SessionFilter::default()
    })?;
    Ok(
      sessions
        .into_iter()
        .find(|s| s.is_live && s.window_contains(now)),
    )
  }
}

fn decode<T: serde::de::DeserializeOwned>(record: &Value) -> Result<T, SkipReason> {
  from_record(record).map_err(|e| SkipReason::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, CacheConfig};
  use crate::db::Database;
  use crate::models::Driver;
  use chrono::TimeZone;
  use serde_json::json;
  use std::sync::Arc;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings {
      api: ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        max_attempts: 2,
        retry_base_delay_secs: 0.01,
      },
      cache: CacheConfig {
        url: Some("memory://".to_string()),
        ..CacheConfig::default()
      },
    }
  }

  fn service(server: &MockServer) -> SessionSyncService<Database> {
    SessionSyncService::new(Database::open_in_memory().unwrap(), settings(server))
  }

  async fn mount(server: &MockServer, endpoint: &str, body: Value) {
    Mock::given(method("GET"))
      .and(path(endpoint))
      .respond_with(ResponseTemplate::new(200).set_body_json(body))
      .mount(server)
      .await;
  }

  fn bahrain_2024() -> Value {
    json!([
      {
        "session_key": 9472,
        "meeting_key": 1229,
        "session_name": "Race",
        "session_type": "Race",
        "location": "Sakhir",
        "circuit_short_name": "Sakhir",
        "country_name": "Bahrain",
        "country_code": "BRN",
        "date_start": "2024-03-02T15:00:00+00:00",
        "date_end": "2024-03-02T17:00:00+00:00",
        "year": 2024
      },
      {
        "session_key": 9468,
        "meeting_key": 1229,
        "session_name": "Qualifying",
        "session_type": "Qualifying",
        "location": "Sakhir",
        "circuit_short_name": "Sakhir",
        "country_name": "Bahrain",
        "country_code": "BRN",
        "date_start": "2024-03-01T16:00:00+00:00",
        "date_end": "2024-03-01T17:00:00+00:00",
        "year": 2024
      }
    ])
  }

  #[test]
  fn test_counts_display_mentions_skipped_only_when_present() {
    let clean = SyncCounts {
      created: 2,
      updated: 1,
      skipped: 0,
    };
    assert_eq!(clean.to_string(), "2 created, 1 updated");

    let partial = SyncCounts { skipped: 3, ..clean };
    assert_eq!(partial.to_string(), "2 created, 1 updated, 3 skipped");
  }

  /// Store that ignores read filters, returning every session it holds.
  struct UnfilteredStore(Vec<Session>);

  impl Store for UnfilteredStore {
    fn upsert_session(
      &self,
      _session_key: i64,
      _build: &dyn Fn(Option<&Session>) -> Session,
    ) -> Result<Upsert, StoreError> {
      unreachable!("read-only store")
    }

    fn upsert_driver(
      &self,
      _driver_number: i64,
      _build: &dyn Fn(Option<&Driver>) -> Driver,
    ) -> Result<Upsert, StoreError> {
      unreachable!("read-only store")
    }

    fn session(&self, session_key: i64) -> Result<Option<Session>, StoreError> {
      Ok(self.0.iter().find(|s| s.session_key == session_key).cloned())
    }

    fn driver(&self, _driver_number: i64) -> Result<Option<Driver>, StoreError> {
      Ok(None)
    }

    fn sessions(&self, _filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
      Ok(self.0.clone())
    }

    fn session_count(&self) -> Result<u64, StoreError> {
      Ok(self.0.len() as u64)
    }

    fn set_session_live(&self, _session_key: i64, _is_live: bool) -> Result<bool, StoreError> {
      unreachable!("read-only store")
    }
  }

  fn stored_session(
    key: i64,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    is_live: bool,
  ) -> Session {
    Session {
      session_key: key,
      meeting_key: 1229,
      session_name: "Race".to_string(),
      session_type: SessionType::Race,
      circuit_name: "Sakhir".to_string(),
      circuit_short_name: "Sakhir".to_string(),
      country_name: "Bahrain".to_string(),
      country_code: "BRN".to_string(),
      date_start: start,
      date_end: end,
      year: 2024,
      is_live,
    }
  }

  #[test]
  fn test_live_detection_checks_flag_and_window_itself() {
    let start = Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 2, 17, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 2, 16, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    let store = UnfilteredStore(vec![
      // Flagged, but the window has elapsed
      stored_session(1, earlier, Some(earlier + chrono::Duration::hours(1)), true),
      // In the window, never flagged
      stored_session(2, start, Some(end), false),
      // Flagged with no end, so no closed window
      stored_session(3, start, None, true),
      stored_session(4, start, Some(end), true),
    ]);
    let svc = SessionSyncService::new(store, ClientSettings::default());

    let live = svc.detect_live_session_at(now).unwrap().unwrap();
    assert_eq!(live.session_key, 4);
    let after = end + chrono::Duration::seconds(1);
    assert_eq!(svc.detect_live_session_at(after).unwrap(), None);
  }

  #[tokio::test]
  async fn test_sync_sessions_is_idempotent() {
    let server = MockServer::start().await;
    mount(&server, "/sessions", bahrain_2024()).await;
    let svc = service(&server);

    let first = svc.sync_sessions(Some(2024)).await.unwrap();
    assert_eq!((first.created, first.updated), (2, 0));

    let second = svc.sync_sessions(Some(2024)).await.unwrap();
    assert_eq!((second.created, second.updated), (0, 2));

    assert_eq!(svc.store().session_count().unwrap(), 2);
    let race = svc.store().session(9472).unwrap().unwrap();
    assert_eq!(race.session_type, SessionType::Race);
    assert_eq!(race.circuit_name, "Sakhir");
  }

  #[tokio::test]
  async fn test_sync_sessions_passes_year_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sessions"))
      .and(query_param("year", "2024"))
      .respond_with(ResponseTemplate::new(200).set_body_json(bahrain_2024()))
      .expect(1)
      .mount(&server)
      .await;

    let counts = service(&server).sync_sessions(Some(2024)).await.unwrap();
    assert_eq!(counts.created, 2);
  }

  #[tokio::test]
  async fn test_sprint_reported_as_race_is_stored_as_sprint() {
    let server = MockServer::start().await;
    mount(
      &server,
      "/sessions",
      json!([{
        "session_key": 9513,
        "session_name": "Sprint",
        "session_type": "Race",
        "date_start": "2024-04-20T03:00:00+00:00",
        "year": 2024
      }]),
    )
    .await;
    let svc = service(&server);

    svc.sync_sessions(None).await.unwrap();

    let sprint = svc.store().session(9513).unwrap().unwrap();
    assert_eq!(sprint.session_type, SessionType::Sprint);
  }

  #[tokio::test]
  async fn test_records_without_key_are_skipped() {
    let server = MockServer::start().await;
    mount(
      &server,
      "/sessions",
      json!([
        { "session_name": "Race", "date_start": "2024-03-02T15:00:00+00:00" },
        { "session_key": null, "session_name": "Race" },
        { "session_key": "bad", "session_name": "Race" },
        { "session_key": 1, "session_name": "Race", "date_start": "2024-03-02T15:00:00+00:00" }
      ]),
    )
    .await;
    let svc = service(&server);

    let counts = svc.sync_sessions(None).await.unwrap();
    assert_eq!(
      counts,
      SyncCounts {
        created: 1,
        updated: 0,
        skipped: 3
      }
    );
  }

  #[tokio::test]
  async fn test_sync_keeps_live_flag() {
    let server = MockServer::start().await;
    mount(&server, "/sessions", bahrain_2024()).await;
    let svc = service(&server);

    svc.sync_sessions(None).await.unwrap();
    svc.store().set_session_live(9472, true).unwrap();
    svc.sync_sessions(None).await.unwrap();

    assert!(svc.store().session(9472).unwrap().unwrap().is_live);
    assert!(!svc.store().session(9468).unwrap().unwrap().is_live);
  }

  #[tokio::test]
  async fn test_sync_drivers_keeps_existing_team_when_incoming_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/drivers"))
      .and(query_param("session_key", "9472"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
        "driver_number": 1,
        "full_name": "Max VERSTAPPEN",
        "name_acronym": "VER",
        "team_name": "",
        "team_colour": "3671C6",
        "headshot_url": null,
        "country_code": "NED"
      }])))
      .expect(1)
      .mount(&server)
      .await;
    let svc = service(&server);

    let mut existing = Driver::blank(1);
    existing.full_name = "Max VERSTAPPEN".to_string();
    existing.team_name = "Red Bull Racing".to_string();
    existing.headshot_url = "https://example.com/ver.png".to_string();
    existing.is_active = false;
    svc.store().upsert_driver(1, &|_| existing.clone()).unwrap();

    let counts = svc.sync_drivers(Some(9472)).await.unwrap();
    assert_eq!((counts.created, counts.updated), (0, 1));

    let ver = svc.store().driver(1).unwrap().unwrap();
    assert_eq!(ver.team_name, "Red Bull Racing");
    assert_eq!(ver.headshot_url, "https://example.com/ver.png");
    assert_eq!(ver.team_colour, "#3671C6");
    assert!(ver.is_active);
  }

  #[tokio::test]
  async fn test_sync_drivers_classifies_safety_car_and_skips_missing_numbers() {
    let server = MockServer::start().await;
    mount(
      &server,
      "/drivers",
      json!([
        { "driver_number": 44, "full_name": "Lewis HAMILTON", "team_name": "Mercedes" },
        { "driver_number": 99, "full_name": "SAFETY CAR", "team_name": "FIA" },
        { "full_name": "Nobody" }
      ]),
    )
    .await;
    let svc = service(&server);

    let counts = svc.sync_drivers(None).await.unwrap();
    assert_eq!(
      counts,
      SyncCounts {
        created: 2,
        updated: 0,
        skipped: 1
      }
    );
    assert!(svc.store().driver(44).unwrap().unwrap().is_active);
    assert!(!svc.store().driver(99).unwrap().unwrap().is_active);
  }

  #[tokio::test]
  async fn test_upstream_failure_surfaces_as_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sessions"))
      .respond_with(ResponseTemplate::new(503))
      .expect(2)
      .mount(&server)
      .await;
    let svc = service(&server);

    let err = svc.sync_sessions(None).await.unwrap_err();
    assert!(matches!(
      err,
      SyncError::Api(ClientError::ConnectionFailure { attempts: 2, .. })
    ));
    assert_eq!(svc.store().session_count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_concurrent_syncs_do_not_duplicate_rows() {
    let server = MockServer::start().await;
    mount(&server, "/sessions", bahrain_2024()).await;

    let store = Arc::new(Database::open_in_memory().unwrap());
    let a = SessionSyncService::new(store.clone(), settings(&server));
    let b = SessionSyncService::new(store.clone(), settings(&server));

    let (ra, rb) = futures::future::join(a.sync_sessions(None), b.sync_sessions(None)).await;
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.created + rb.created, 2);
    assert_eq!(ra.updated + rb.updated, 2);
    assert_eq!(store.session_count().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_get_available_sessions_filters_locally() {
    let server = MockServer::start().await;
    mount(&server, "/sessions", bahrain_2024()).await;
    let svc = service(&server);
    svc.sync_sessions(None).await.unwrap();

    assert_eq!(svc.get_available_sessions(2024, None).unwrap().len(), 2);
    let quali = svc
      .get_available_sessions(2024, Some(SessionType::Qualifying))
      .unwrap();
    assert_eq!(quali.len(), 1);
    assert_eq!(quali[0].session_key, 9468);
    assert!(svc.get_available_sessions(2023, None).unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_detect_live_session_needs_window_and_flag() {
    let server = MockServer::start().await;
    mount(&server, "/sessions", bahrain_2024()).await;
    let svc = service(&server);
    svc.sync_sessions(None).await.unwrap();

    let during_race = Utc.with_ymd_and_hms(2024, 3, 2, 16, 0, 0).unwrap();
    let after_race = Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap();

    // In the window but nobody flagged it
    assert_eq!(svc.detect_live_session_at(during_race).unwrap(), None);

    svc.store().set_session_live(9472, true).unwrap();
    let live = svc.detect_live_session_at(during_race).unwrap().unwrap();
    assert_eq!(live.session_key, 9472);

    // Still flagged, but the window has elapsed
    assert_eq!(svc.detect_live_session_at(after_race).unwrap(), None);
    // And right now, years later
    assert_eq!(svc.detect_live_session().unwrap(), None);
  }
}
