//! Bounded exponential-backoff retry around remote calls.
//!
//! Only failures the policy classifies as transient are retried. Anything
//! else, or running out of attempts, surfaces as a [`RemoteCallError`] tagged
//! with the action that issued the call.

use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use crate::api::logs::{log_error, log_warning_indent};
use crate::error::{RemoteCallError, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 3.0;
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Retry settings and failure classification.
pub struct RetryPolicy<E = StoreError> {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            backoff_multiplier: self.backoff_multiplier,
            is_retryable: self.is_retryable,
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    /// Default timings with a custom classifier.
    pub fn new(is_retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            is_retryable,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Wait before retrying after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for RetryPolicy<StoreError> {
    /// Six attempts, ×3 backoff from 100 ms, retrying only on service unavailability.
    fn default() -> Self {
        Self::new(StoreError::is_unavailable)
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
pub async fn execute<T, E, F, Fut>(
    action: &str,
    policy: &RetryPolicy<E>,
    mut operation: F,
) -> Result<T, RemoteCallError>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_attempts || !(policy.is_retryable)(&e) {
                    log_error(format!("{} failed with error: {}", action, e));
                    return Err(RemoteCallError {
                        action: action.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }

                let delay = policy.delay_for(attempt);
                log_warning_indent(
                    format!(
                        "Retrying {} (attempt {}/{}) in {} ms: {}",
                        action,
                        attempt + 1,
                        policy.max_attempts,
                        delay.as_millis(),
                        e
                    ),
                    1,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
