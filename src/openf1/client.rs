use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::cache::{
  build_key, open_backend, CacheBackend, CacheLayer, NoopStorage, TtlPolicy, Volatility,
};
use crate::config::{ApiConfig, CacheConfig};

use super::endpoint::Endpoint;
use super::error::{ClientError, FetchError};
use super::params::{QueryParams, DATE_AFTER};
use super::retry::{RetryError, RetryPolicy};

/// Idle keep-alive connections held per host
const MAX_IDLE_PER_HOST: usize = 10;

/// Everything needed to open a client.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
  pub api: ApiConfig,
  pub cache: CacheConfig,
}

/// OpenF1 API client with response caching and retries.
///
/// Each instance owns its HTTP pool and cache connection. Open one per
/// logical operation and `close` it when done; instances are never shared
/// process-wide.
pub struct OpenF1Client {
  http: reqwest::Client,
  base_url: Url,
  cache: CacheLayer,
  retry: RetryPolicy,
}

impl OpenF1Client {
  /// Open a client with the cache backend named in `settings`.
  ///
  /// A backend that cannot be opened is replaced by a disabled cache.
  pub fn open(settings: &ClientSettings) -> Result<Self, ClientError> {
    let cache_url = settings.cache.resolved_url();
    let backend: Box<dyn CacheBackend> = match open_backend(&cache_url) {
      Ok(backend) => backend,
      Err(e) => {
        warn!(url = %cache_url, error = %e, "Cache unavailable, continuing without it");
        Box::new(NoopStorage)
      }
    };

    Self::with_backend(&settings.api, settings.cache.ttl_policy(), backend)
  }

  pub fn with_backend(
    api: &ApiConfig,
    ttl: TtlPolicy,
    backend: Box<dyn CacheBackend>,
  ) -> Result<Self, ClientError> {
    let http = reqwest::Client::builder()
      .timeout(api.timeout())
      .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
      .build()?;

    Ok(Self {
      http,
      base_url: parse_base_url(&api.base_url)?,
      cache: CacheLayer::new(backend, ttl),
      retry: RetryPolicy {
        max_attempts: api.max_attempts,
        base_delay: api.retry_base_delay(),
      },
    })
  }

  /// Session metadata, optionally for one season.
  pub async fn get_sessions(&self, year: Option<i32>) -> Result<Vec<Value>, ClientError> {
    let params = QueryParams::new().with_opt("year", year);
    self.fetch(Endpoint::Sessions, params).await
  }

  /// Driver roster, optionally for one session.
  pub async fn get_drivers(&self, session_key: Option<i64>) -> Result<Vec<Value>, ClientError> {
    let params = QueryParams::new().with_opt("session_key", session_key);
    self.fetch(Endpoint::Drivers, params).await
  }

  /// Car telemetry (~3.7 Hz). Passing `date_after` makes this an incremental live pull.
  pub async fn get_car_data(
    &self,
    session_key: i64,
    driver_number: i64,
    date_after: Option<&str>,
  ) -> Result<Vec<Value>, ClientError> {
    let params = QueryParams::new()
      .with("session_key", session_key)
      .with("driver_number", driver_number)
      .with_opt(DATE_AFTER, date_after);
    self.fetch(Endpoint::CarData, params).await
  }

  /// Lap times and sectors.
  pub async fn get_lap_data(
    &self,
    session_key: i64,
    driver_number: Option<i64>,
  ) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Laps, session_driver_params(session_key, driver_number))
      .await
  }

  /// GPS positions of all cars.
  pub async fn get_positions(&self, session_key: i64) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Position, session_params(session_key))
      .await
  }

  /// Time gaps between cars.
  pub async fn get_intervals(&self, session_key: i64) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Intervals, session_params(session_key))
      .await
  }

  pub async fn get_pit_data(
    &self,
    session_key: i64,
    driver_number: Option<i64>,
  ) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Pit, session_driver_params(session_key, driver_number))
      .await
  }

  /// Tyre compound per stint.
  pub async fn get_stints(
    &self,
    session_key: i64,
    driver_number: Option<i64>,
  ) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Stints, session_driver_params(session_key, driver_number))
      .await
  }

  pub async fn get_weather(&self, session_key: i64) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Weather, session_params(session_key))
      .await
  }

  /// Flags, safety car periods, incidents.
  pub async fn get_race_control(&self, session_key: i64) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::RaceControl, session_params(session_key))
      .await
  }

  pub async fn get_team_radio(
    &self,
    session_key: i64,
    driver_number: Option<i64>,
  ) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::TeamRadio, session_driver_params(session_key, driver_number))
      .await
  }

  pub async fn get_overtakes(&self, session_key: i64) -> Result<Vec<Value>, ClientError> {
    self
      .fetch(Endpoint::Overtakes, session_params(session_key))
      .await
  }

  /// Release the HTTP pool and the cache connection.
  pub async fn close(self) {
    drop(self.http);
    self.cache.close().await;
  }

  /// Cache lookup, then a retried GET on a miss, then a cache write.
  pub async fn fetch(
    &self,
    endpoint: Endpoint,
    params: QueryParams,
  ) -> Result<Vec<Value>, ClientError> {
    let key = build_key(endpoint.path(), &params);
    let volatility = volatility_of(endpoint, &params);
    let params = &params;

    let result = self
      .cache
      .fetch(&key, volatility, move || {
        self.fetch_with_retries(endpoint, params)
      })
      .await?;

    Ok(result.data)
  }

  async fn fetch_with_retries(
    &self,
    endpoint: Endpoint,
    params: &QueryParams,
  ) -> Result<Vec<Value>, ClientError> {
    let label = endpoint.to_string();
    let url = self
      .base_url
      .join(endpoint.path())
      .map_err(|source| ClientError::InvalidBaseUrl {
        url: self.base_url.to_string(),
        source,
      })?;
    let query = params.to_query_pairs();
    let (url, query) = (&url, query.as_slice());

    let outcome = self
      .retry
      .run(&label, move || self.get_once(url, query))
      .await;

    match outcome {
      Ok(data) => {
        info!(
          endpoint = %label,
          params = %params,
          results = data.len(),
          "OpenF1 request succeeded"
        );
        Ok(data)
      }
      Err(RetryError::Terminal {
        error: FetchError::Status(status),
        ..
      }) => Err(ClientError::UpstreamRejection {
        endpoint: label,
        status,
      }),
      Err(RetryError::Terminal { error, .. }) => Err(ClientError::InvalidPayload {
        endpoint: label,
        source: error,
      }),
      Err(RetryError::Exhausted { attempts, last }) => Err(ClientError::ConnectionFailure {
        endpoint: label,
        attempts,
        source: last,
      }),
    }
  }

  /// One GET, no retries.
  async fn get_once(&self, url: &Url, query: &[(String, String)]) -> Result<Vec<Value>, FetchError> {
    let response = self
      .http
      .get(url.clone())
      .query(query)
      .send()
      .await
      .map_err(FetchError::from_transport)?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.bytes().await.map_err(FetchError::from_transport)?;
    serde_json::from_slice(&body).map_err(FetchError::Decode)
  }
}

/// Incremental pulls and inherently fast-changing resources are live.
pub fn volatility_of(endpoint: Endpoint, params: &QueryParams) -> Volatility {
  if endpoint.is_inherently_live() || params.contains(DATE_AFTER) {
    Volatility::Live
  } else {
    Volatility::Historical
  }
}

fn session_params(session_key: i64) -> QueryParams {
  QueryParams::new().with("session_key", session_key)
}

fn session_driver_params(session_key: i64, driver_number: Option<i64>) -> QueryParams {
  session_params(session_key).with_opt("driver_number", driver_number)
}

/// Parse the base URL so that joining a relative path appends to it.
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
  let mut url = Url::parse(raw).map_err(|source| ClientError::InvalidBaseUrl {
    url: raw.to_string(),
    source,
  })?;
  if !url.path().ends_with('/') {
    let path = format!("{}/", url.path());
    url.set_path(&path);
  }
  Ok(url)
}
