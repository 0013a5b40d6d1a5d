//! Bounded retries with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{Classify, FailureKind};

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
  /// A terminal failure; no further attempts were made
  Terminal { attempt: u32, error: E },
  /// Every attempt failed with a retryable error
  Exhausted { attempts: u32, last: E },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_secs(1),
    }
  }
}

impl RetryPolicy {
  /// Wait after the failed `attempt` (1-based): `base_delay * 2^(attempt-1)`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    self.base_delay.saturating_mul(factor)
  }

  /// Run `operation` until it succeeds, fails terminally, or runs out of attempts.
  ///
  /// `label` names the operation in logs. Each failed attempt logs a warning.
  /// There is no wait after the last attempt.
  pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError<E>>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::fmt::Display,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
      let err = match operation().await {
        Ok(value) => return Ok(value),
        Err(err) => err,
      };

      warn!(
        endpoint = label,
        attempt,
        max_attempts,
        error = %err,
        "OpenF1 request attempt failed"
      );

      if err.failure_kind() == FailureKind::Terminal {
        return Err(RetryError::Terminal {
          attempt,
          error: err,
        });
      }

      if attempt >= max_attempts {
        return Err(RetryError::Exhausted {
          attempts: attempt,
          last: err,
        });
      }

      let delay = self.delay_for(attempt);
      debug!(endpoint = label, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
      tokio::time::sleep(delay).await;
      attempt += 1;
    }
  }
}
