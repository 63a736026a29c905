//! Bounded retry with backoff for operations that fail transiently.
//!
//! Only errors the caller classifies as retryable are retried; anything
//! else is returned on the spot.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Write-conflict policy: five attempts ten milliseconds apart.
    pub fn conflict() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 1.0,
        }
    }

    /// Discovery refresh policy, for kinds still registering at start-up:
    /// four attempts starting at thirty seconds, doubling.
    pub fn discovery() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(240),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::conflict()
    }
}

/// Run `operation` until it succeeds, fails with an error `retryable`
/// rejects, or `config.max_attempts` is used up. The last error is
/// returned.
pub async fn retry_with_backoff_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !retryable(&e) => return Err(e),
            Err(e) if attempt >= config.max_attempts => {
                debug!(operation = %operation_name, attempt, error = %e, "retries exhausted");
                return Err(e);
            }
            Err(e) => {
                counter!("dynamichelper_retries", 1u64, "operation" => operation_name.to_string());
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
