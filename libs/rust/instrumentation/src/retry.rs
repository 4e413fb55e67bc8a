//! Retry policy with exponential backoff.
//!
//! `max_attempts` counts total attempts, not additional retries: `None`, `0`
//! and `1` all perform exactly one attempt, `3` performs up to three.
//! The pause after failed attempt `n` (1-based) is `backoff * (2^n - 1)`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    backoff: Option<Duration>,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: None,
            backoff: None,
        }
    }

    /// Retry up to `count` total attempts without pausing.
    #[must_use]
    pub const fn attempts(count: u32) -> Self {
        Self {
            max_attempts: Some(count),
            backoff: None,
        }
    }

    /// Retry up to `count` total attempts with exponential backoff.
    #[must_use]
    pub const fn with_backoff(count: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(count),
            backoff: Some(backoff),
        }
    }

    /// Configured attempt limit, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Configured backoff base, if any.
    #[must_use]
    pub const fn backoff(&self) -> Option<Duration> {
        self.backoff
    }

    /// Calculate the pause after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(base) = self.backoff else {
            return Duration::ZERO;
        };
        let factor = 2u32.saturating_pow(attempt).saturating_sub(1);
        base.saturating_mul(factor)
    }

    /// Check if another attempt is allowed after `attempt` attempts.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt < max)
    }

    /// Execute an async operation with retries.
    ///
    /// The operation receives the 1-based attempt number. Attempts are
    /// strictly sequential.
    ///
    /// # Errors
    ///
    /// Returns the last error if all attempts are exhausted.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_while(operation, |_| true).await
    }

    /// Execute with retries, giving up early on errors `retryable` refuses.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once all
    /// attempts are exhausted.
    pub async fn execute_while<F, Fut, T, E, P>(&self, mut operation: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(attempt) || !retryable(&error) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
