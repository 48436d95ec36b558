//! Bounded retry with exponential backoff
//!
//! Wraps a single fallible operation (opening a generation stream, one
//! platform call) with a fixed attempt budget. Callers decide which errors
//! are worth another attempt.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one (values below 1 act as 1)
    pub max_attempts: u32,
    /// Delay in milliseconds before the second attempt
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) applied around each delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait before `attempt` (1-based).
    ///
    /// The first attempt runs immediately; attempt n waits `base * 2^(n-2)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt - 2));
        let capped = exponential.min(self.max_delay_ms);

        let jitter_range = (capped as f64 * self.jitter_factor) as i64;
        let millis = if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        };
        Duration::from_millis(millis)
    }
}

/// A successful value and the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// The last error seen and the number of attempts made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt budget is spent.
pub async fn with_retry<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<Attempted<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        attempt,
                        operation = operation_name,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(Attempted {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => {
                if !is_retryable(&e) {
                    tracing::error!(
                        attempt,
                        error = %e,
                        operation = operation_name,
                        "Operation failed with non-retryable error"
                    );
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                    });
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        error = %e,
                        operation = operation_name,
                        "Operation failed after all retry attempts"
                    );
                    return Err(RetryFailure {
                        error: e,
                        attempts: attempt,
                    });
                }

                let delay = config.delay_before(attempt + 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    operation = operation_name,
                    "Operation failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
