//! Retry policy for unary calls.
//!
//! Only `Unavailable` is retried: the request never reached a healthy
//! server, so replaying it cannot apply it twice.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tonic::{Code, Status};
use tracing::debug;

use crate::config::duration_ms;

/// Exponential backoff retry policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(with = "duration_ms", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,

    /// Upper bound for any single delay.
    #[serde(with = "duration_ms", rename = "max_backoff_ms")]
    pub max_backoff: Duration,

    /// Growth factor applied after each retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs a single attempt.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `retry` (zero based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let nanos = (self.initial_backoff.as_nanos() as f64 * factor).round();
        let cap = self.max_backoff.as_nanos() as f64;
        Duration::from_nanos(nanos.min(cap) as u64)
    }

    /// Whether a call that failed with `status` on attempt `attempt`
    /// (one based) should be tried again.
    pub fn should_retry(&self, status: &Status, attempt: u32) -> bool {
        status.code() == Code::Unavailable && attempt < self.max_attempts
    }

    /// Runs `call` until it succeeds, fails with a non-retryable status,
    /// or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, Status>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(status) if self.should_retry(&status, attempt) => {
                    let delay = self.backoff(attempt - 1);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        message = status.message(),
                        "Identity service unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(status) => return Err(status),
            }
        }
    }
}
