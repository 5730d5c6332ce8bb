//! Exponential backoff with jitter, shared by the retail catalog client
//! and the LLM client wrapper.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::CostPilotError;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retries a fallible async operation with exponential backoff. Stops
/// early on a non-retryable error. Used both for Retail Prices HTTP pages
/// (§5, default 30s timeout / 3 retries) and LLM calls (default 60s
/// timeout / 3 retries); the timeout itself is applied by the caller via
/// `tokio::time::timeout` around each attempt.
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, CostPilotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CostPilotError>>,
    {
        let mut attempts = 0;
        let mut last_error: Option<CostPilotError> = None;

        while attempts < self.config.max_attempts {
            attempts += 1;

            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!(attempts, "operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !err.is_retryable() {
                        debug!(error = %err, "non-retryable error, not retrying");
                        return Err(err);
                    }

                    warn!(
                        attempt = attempts,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "attempt failed"
                    );
                    last_error = Some(err);

                    if attempts < self.config.max_attempts {
                        let backoff = self.calculate_backoff(attempts);
                        debug!(?backoff, "retrying after backoff");
                        sleep(backoff).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(CostPilotError::Internal(
            "retry loop exited without an error".to_string(),
        )))
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base =
            self.config.initial_backoff.as_secs_f64() * self.config.multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.config.max_backoff.as_secs_f64());
        let backoff = Duration::from_secs_f64(capped);

        if self.config.jitter {
            add_jitter(backoff)
        } else {
            backoff
        }
    }
}

fn add_jitter(duration: Duration) -> Duration {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter: f64 = rng.gen_range(0.0..=0.3);
    Duration::from_secs_f64(duration.as_secs_f64() * (1.0 - jitter))
}
