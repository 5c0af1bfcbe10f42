// fulfillment/src/retry.rs

//! Exponential backoff for calls into collaborators.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts including the first one. Zero behaves like one.
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay: Duration::from_millis(50),
      max_delay: Duration::from_secs(2),
    }
  }
}

impl RetryPolicy {
  /// Single attempt, no sleeping.
  pub fn none() -> Self {
    Self {
      max_attempts: 1,
      base_delay: Duration::ZERO,
      max_delay: Duration::ZERO,
    }
  }

  /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`,
  /// capped at `max_delay`.
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let base_ms = self.base_delay.as_millis() as u64;
    let exponential_ms = base_ms.saturating_mul(1u64 << attempt.min(20));
    Duration::from_millis(exponential_ms.min(self.max_delay.as_millis() as u64))
  }

  fn attempts(&self) -> u32 {
    self.max_attempts.max(1)
  }
}

/// Runs `f` until it succeeds, returns an error `is_retryable` rejects, or the
/// policy runs out of attempts. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut, R>(policy: &RetryPolicy, operation: &str, is_retryable: R, mut f: F) -> Result<T, E>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  R: Fn(&E) -> bool,
  E: std::fmt::Display,
{
  let attempts = policy.attempts();
  let mut attempt = 0;
  loop {
    match f().await {
      Ok(value) => return Ok(value),
      Err(e) if attempt + 1 < attempts && is_retryable(&e) => {
        let delay = policy.delay_for_attempt(attempt);
        warn!(operation, attempt = attempt + 1, max_attempts = attempts, ?delay, error = %e, "Retrying after failure.");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}
