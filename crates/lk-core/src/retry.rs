//! Generic retry executor with exponential backoff.
//!
//! The policy is a plain value; callers pass a closure that receives the
//! 1-based attempt number, so per-attempt bookkeeping (e.g. persisting an
//! attempt row) lives in the caller, not here.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// How many times to try and how long to wait in between.
///
/// The delay after failed attempt `n` is `base_delay × backoff_factor^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, backoff_factor: u32) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
        }
    }

    /// Single attempt, no waiting.
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1)
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let multiplier = self.backoff_factor.max(1).saturating_pow(exp);
        self.base_delay.saturating_mul(multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2)
    }
}

/// Final failure after the policy was exhausted (or a non-retryable error).
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last}")]
pub struct RetryError<E>
where
    E: fmt::Debug + fmt::Display,
{
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds or the policy is exhausted.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
{
    retry_if(policy, op, |_| true).await
}

/// Like [`retry`], but stops early when `is_retryable` rejects an error.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts || !is_retryable(&e) => {
                error!(attempt, max_attempts, error = %e, "giving up");
                return Err(RetryError {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
