//! Bounded exponential backoff for provider calls
//!
//! Delay before attempt `n + 1` is `base_delay * 3^n`. Only errors for which
//! [`crate::error::TrackerError::is_retryable`] holds are retried.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Result;

pub const BACKOFF_FACTOR: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after the failed attempt with zero-based index `attempt_index`
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay
            .saturating_mul(BACKOFF_FACTOR.saturating_pow(attempt_index))
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt
/// budget is spent. The most recent error is returned on exhaustion.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", label, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!("{} failed terminally on attempt {}: {}", label, attempt + 1, e);
                return Err(e);
            }
            Err(e) => {
                if attempt + 1 >= max_attempts {
                    warn!("{} failed after {} attempts: {}", label, max_attempts, e);
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} attempt {} failed: {}. Retrying in {}ms...",
                    label,
                    attempt + 1,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Convenience wrapper matching the `with_retry(op, max_attempts, base_delay)` shape
pub async fn retry_with_backoff<T, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry(RetryPolicy::new(max_attempts, base_delay), "operation", operation).await
}
