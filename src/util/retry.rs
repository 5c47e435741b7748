//! Bounded retry for connection establishment.

use std::future::Future;
use std::time::Duration;

use crate::error::ParleyError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration. Zero disables sleeping between attempts.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::establishment()
    }
}

impl RetryPolicy {
    /// Three attempts, back to back. The transport's own connect timeout is
    /// the only pacing.
    pub fn establishment() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::establishment()
        }
    }

    /// Execute an async operation with retry.
    ///
    /// Non-retryable errors are returned immediately. When every attempt
    /// fails, only the last error is surfaced.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ParleyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ParleyError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt >= max_attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Retrying after error"
                    );

                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                        backoff = Duration::from_secs_f64(
                            (backoff.as_secs_f64() * self.multiplier)
                                .min(self.max_backoff.as_secs_f64()),
                        );
                    }
                }
            }
        }
    }
}
