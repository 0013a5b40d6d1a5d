use thiserror::Error;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  /// Transient condition that may clear on its own
  Retryable,
  /// The request itself is bad and will never succeed unmodified
  Terminal,
}

/// Implemented by errors a retry loop can inspect.
pub trait Classify {
  fn failure_kind(&self) -> FailureKind;
}

/// Failure of a single HTTP attempt.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request timed out: {0}")]
  Timeout(#[source] reqwest::Error),

  #[error("connection failed: {0}")]
  Connection(#[source] reqwest::Error),

  #[error("upstream responded with status {0}")]
  Status(u16),

  #[error("response is not a JSON array: {0}")]
  Decode(#[source] serde_json::Error),
}

impl FetchError {
  pub fn from_transport(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      Self::Timeout(err)
    } else {
      Self::Connection(err)
    }
  }
}

impl Classify for FetchError {
  /// Every 5xx is retried alike; anything below 500 is the caller's fault.
  fn failure_kind(&self) -> FailureKind {
    match self {
      FetchError::Timeout(_) | FetchError::Connection(_) => FailureKind::Retryable,
      FetchError::Status(code) if *code >= 500 => FailureKind::Retryable,
      FetchError::Status(_) => FailureKind::Terminal,
      FetchError::Decode(_) => FailureKind::Terminal,
    }
  }
}

/// Errors surfaced by the OpenF1 client.
#[derive(Debug, Error)]
pub enum ClientError {
  /// Every attempt hit a retryable failure
  #[error("{endpoint}: failed after {attempts} attempts")]
  ConnectionFailure {
    endpoint: String,
    attempts: u32,
    #[source]
    source: FetchError,
  },

  /// Non-retryable status from the API
  #[error("{endpoint} returned {status}")]
  UpstreamRejection { endpoint: String, status: u16 },

  #[error("{endpoint} returned an unusable payload")]
  InvalidPayload {
    endpoint: String,
    #[source]
    source: FetchError,
  },

  #[error("invalid API base URL {url}")]
  InvalidBaseUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("failed to build HTTP client")]
  Http(#[from] reqwest::Error),
}
