use tracing::{info, warn};

use crate::db::Store;

use super::service::{SessionSyncService, SyncCounts, SyncError};

/// Result of one step of a scheduled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
  Completed(SyncCounts),
  /// Upstream was unavailable; the step counts as empty
  Skipped { reason: String },
}

impl StepOutcome {
  pub fn counts(&self) -> SyncCounts {
    match self {
      StepOutcome::Completed(counts) => *counts,
      StepOutcome::Skipped { .. } => SyncCounts::default(),
    }
  }

  pub fn is_skipped(&self) -> bool {
    matches!(self, StepOutcome::Skipped { .. })
  }
}

impl std::fmt::Display for StepOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.counts())?;
    if self.is_skipped() {
      write!(f, " (skipped)")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSummary {
  pub sessions: StepOutcome,
  pub drivers: StepOutcome,
}

impl std::fmt::Display for ScheduledSummary {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Sessions: {} | Drivers: {}", self.sessions, self.drivers)
  }
}

/// Periodic sync: sessions, then drivers.
///
/// A step that finds OpenF1 unavailable is logged and reported as skipped so
/// the next step still runs. Storage failures abort the run.
pub async fn run_scheduled_sync<S: Store>(
  service: &SessionSyncService<S>,
  year: Option<i32>,
) -> Result<ScheduledSummary, SyncError> {
  let sessions = step("sessions", service.sync_sessions(year).await)?;
  let drivers = step("drivers", service.sync_drivers(None).await)?;

  let summary = ScheduledSummary { sessions, drivers };
  info!(%summary, "Scheduled sync complete");
  Ok(summary)
}

fn step(name: &str, result: Result<SyncCounts, SyncError>) -> Result<StepOutcome, SyncError> {
  match result {
    Ok(counts) => Ok(StepOutcome::Completed(counts)),
    Err(SyncError::Api(e)) => {
      warn!(step = name, error = %e, "Sync step skipped, OpenF1 unavailable");
      Ok(StepOutcome::Skipped {
        reason: e.to_string(),
      })
    }
    Err(e) => Err(e),
  }
}

/// Counts for one season of an initial population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearSync {
  pub year: i32,
  pub sessions: SyncCounts,
  pub drivers: SyncCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialSync {
  /// Sessions already exist locally, nothing was fetched
  AlreadyPopulated,
  Synced(Vec<YearSync>),
}

/// First-run population of an empty database, one season at a time.
pub async fn run_initial_sync<S: Store>(
  service: &SessionSyncService<S>,
  years: &[i32],
) -> Result<InitialSync, SyncError> {
  if service.store().session_count()? > 0 {
    info!("Sessions table already populated, skipping initial sync");
    return Ok(InitialSync::AlreadyPopulated);
  }

  let mut synced = Vec::with_capacity(years.len());
  for &year in years {
    info!(year, "Initial sync");
    let sessions = service.sync_sessions(Some(year)).await?;
    let drivers = service.sync_drivers(None).await?;
    synced.push(YearSync {
      year,
      sessions,
      drivers,
    });
  }

  Ok(InitialSync::Synced(synced))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, CacheConfig};
  use crate::db::Database;
  use crate::openf1::ClientSettings;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn service(server: &MockServer) -> SessionSyncService<Database> {
    let settings = ClientSettings {
      api: ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        max_attempts: 2,
        retry_base_delay_secs: 0.01,
      },
      cache: CacheConfig {
        url: Some("none".to_string()),
        ..CacheConfig::default()
      },
    };
    SessionSyncService::new(Database::open_in_memory().unwrap(), settings)
  }

  fn session(key: i64, year: i32) -> serde_json::Value {
    json!({
      "session_key": key,
      "session_name": "Race",
      "session_type": "Race",
      "date_start": format!("{}-03-02T15:00:00+00:00", year),
      "date_end": format!("{}-03-02T17:00:00+00:00", year),
      "year": year
    })
  }

  #[tokio::test]
  async fn test_unavailable_step_is_skipped_and_next_step_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sessions"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/drivers"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "driver_number": 1, "full_name": "Max VERSTAPPEN" }
      ])))
      .expect(1)
      .mount(&server)
      .await;
    let svc = service(&server);

    let summary = run_scheduled_sync(&svc, None).await.unwrap();

    assert!(summary.sessions.is_skipped());
    assert_eq!(summary.sessions.counts(), SyncCounts::default());
    assert_eq!(summary.drivers.counts().created, 1);
    assert_eq!(
      summary.to_string(),
      "Sessions: 0 created, 0 updated (skipped) | Drivers: 1 created, 0 updated"
    );
  }

  #[tokio::test]
  async fn test_scheduled_sync_completes_both_steps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sessions"))
      .and(query_param("year", "2024"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([session(9472, 2024)])))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/drivers"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;
    let svc = service(&server);

    let summary = run_scheduled_sync(&svc, Some(2024)).await.unwrap();
    assert_eq!(
      summary,
      ScheduledSummary {
        sessions: StepOutcome::Completed(SyncCounts {
          created: 1,
          updated: 0,
          skipped: 0
        }),
        drivers: StepOutcome::Completed(SyncCounts::default()),
      }
    );
  }

  #[tokio::test]
  async fn test_initial_sync_walks_each_year() {
    let server = MockServer::start().await;
    for (year, key) in [(2023, 7953), (2024, 9472)] {
      Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(query_param("year", year.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session(key, year)])))
        .expect(1)
        .mount(&server)
        .await;
    }
    Mock::given(method("GET"))
      .and(path("/drivers"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;
    let svc = service(&server);

    let outcome = run_initial_sync(&svc, &[2023, 2024]).await.unwrap();

    let InitialSync::Synced(years) = outcome else {
      panic!("expected a sync, got {:?}", outcome);
    };
    assert_eq!(years.iter().map(|y| y.year).collect::<Vec<_>>(), vec![2023, 2024]);
    assert!(years.iter().all(|y| y.sessions.created == 1));
    assert_eq!(svc.store().session_count().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_initial_sync_skips_populated_database() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([session(1, 2024)])))
      .expect(1)
      .mount(&server)
      .await;
    let svc = service(&server);
    svc.sync_sessions(None).await.unwrap();

    let outcome = run_initial_sync(&svc, &[2023, 2024, 2025]).await.unwrap();
    assert_eq!(outcome, InitialSync::AlreadyPopulated);
  }
}
