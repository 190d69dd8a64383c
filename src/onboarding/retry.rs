use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Bounded exponential backoff for idempotent re-reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Re-run `read` until it yields a row. Absent rows and backend errors are
/// retried; `Ok(None)` means the row never showed up, `Err` carries the last
/// error when the final attempt failed.
pub async fn read_until_present<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut read: F,
) -> Result<Option<T>, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, StoreError>>,
{
    let attempts = policy.attempts.max(1);
    let mut last = Ok(None);
    for attempt in 0..attempts {
        match read().await {
            Ok(Some(row)) => return Ok(Some(row)),
            Ok(None) => last = Ok(None),
            Err(StoreError::Backend(msg)) => {
                tracing::warn!(what, attempt, error = %msg, "re-read failed");
                last = Err(StoreError::Backend(msg));
            }
            Err(other) => return Err(other),
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }
    last
}
