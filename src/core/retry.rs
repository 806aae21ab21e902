//! Bounded optimistic-concurrency retry.
//!
//! Account writes are compare-and-swap on the account version. When another writer got
//! there first the attempt fails with [`Error::Conflict`], its database transaction is
//! rolled back, and the whole operation is run again from a fresh read. After
//! `max_attempts` the conflict is surfaced as [`Error::ConflictRetryExhausted`].

use crate::{
    config::app::RetryConfig,
    errors::{Error, Result},
};
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

/// How often and how patiently a conflicting operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never zero.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each further attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

/// Runs `attempt` until it succeeds, fails with a non-conflict error, or the policy's
/// attempt budget is spent.
///
/// Each call of `attempt` must be a complete atomic unit: it opens its own database
/// transaction and either commits it or drops it.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Err(Error::Conflict { resource }) => {
                if attempts >= policy.max_attempts {
                    warn!(operation, attempts, %resource, "Giving up after repeated conflicts");
                    return Err(Error::ConflictRetryExhausted {
                        operation,
                        attempts,
                    });
                }
                let delay = policy.delay_after(attempts);
                debug!(operation, attempts, %resource, ?delay, "Conflict, retrying");
                tokio::time::sleep(delay).await;
            }
            outcome => return outcome,
        }
    }
}
