//! Lookup Retry Policy
//!
//! The record store is populated by the intake form slightly after the
//! handlers that need the record fire, so a lookup right after submission
//! can miss. The policy is a bounded loop: one fixed initial delay, a
//! fixed attempt count and a fixed inter-attempt delay.

use std::future::Future;
use std::time::Duration;

/// Bounded retry for eventually-consistent lookups.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No delays, single attempt. For tests and flows that must not wait.
    pub const fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it yields a hit or attempts run out. A lookup error
    /// propagates immediately; a miss after the last attempt is `None`.
    pub async fn find<T, E, F, Fut>(&self, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        tokio::time::sleep(self.initial_delay).await;

        for attempt in 1..=self.max_attempts {
            if let Some(found) = op().await? {
                return Ok(Some(found));
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Ok(None)
    }
}
