//! Retry utilities with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Bounded attempts with exponential backoff between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each later one.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based): `base_delay * 2^(retry-1)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay)
    }
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub error: E,
    /// Retries performed before giving up.
    pub retries: u32,
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up. `op` receives the 1-based attempt number.
///
/// Returns the value together with the number of retries it took.
pub async fn retry_transient<T, E, F, Fut, P>(
    policy: &BackoffPolicy,
    operation: &str,
    mut op: F,
    is_transient: P,
) -> Result<(T, u32), RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt - 1)),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                let delay = policy.delay_for_retry(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryExhausted {
                    error: e,
                    retries: attempt - 1,
                })
            }
        }
    }
}

/// State tracker for repeated operations that may fail intermittently.
///
/// Background loops use it to stop logging the same failure on every tick.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                failures = self.consecutive_failures,
                "Operation recovered after consecutive failures"
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged (not suppressed).
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                failures = self.max_logged_failures,
                "Suppressing further failure logs"
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
