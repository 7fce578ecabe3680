//! Retry with exponential backoff for source and target calls.
//!
//! Only failures that can clear on their own are retried: throttling,
//! timeouts, dropped connections and primary elections on the target.
//! Engine and configuration errors fail immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub backoff_multiplier: f64,
    /// Whether to add jitter to spread out concurrent retries.
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a config with no retries (for testing or when retries are unwanted).
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Calculates the delay for a given attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.add_jitter {
            // Up to 25% on top.
            capped_delay + capped_delay * 0.25 * rand_jitter()
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Pseudo-random value in `[0, 1)` from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

/// Determines if an error is worth another attempt.
#[must_use]
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Transient(_) | Error::Io(_) => true,
        Error::SourceConnection(message) => is_transient_message(message),
        Error::Execution { message, .. } => is_transient_message(message),
        Error::Engine(_)
        | Error::Config(_)
        | Error::Metadata(_)
        | Error::Json(_)
        | Error::Yaml(_) => false,
    }
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();

    let is_throttled = message.contains("429")
        || message.contains("16500")
        || message.contains("too many requests")
        || message.contains("request rate is large");

    let is_network = message.contains("timeout")
        || message.contains("timed out")
        || message.contains("connection refused")
        || message.contains("connection reset")
        || message.contains("temporary");

    let is_failover = message.contains("not primary")
        || message.contains("not master")
        || message.contains("primary stepped down")
        || message.contains("503")
        || message.contains("service unavailable");

    is_throttled || is_network || is_failover
}

/// Executes an async operation with retry logic.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once every
/// attempt has failed.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt);
            debug!(
                operation = operation_name,
                attempt,
                max_retries = config.max_retries,
                ?delay,
                "retrying"
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(operation = operation_name, retries = attempt, "succeeded after retries");
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_retries && is_retryable_error(&e) => {
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_retries + 1,
                    error = %e,
                    "retryable error"
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
