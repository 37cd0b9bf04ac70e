use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::{Result, RetryClass};

/// Attempts made by [`RetryPolicy::default`]
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Pause after a transient failure
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Bounded retry around one transport call site.
///
/// Errors are classified by [`crate::Error::retry_class`]: transient errors
/// wait for `backoff` before the next attempt, other BLE errors retry
/// straight away, everything else is returned on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let class = e.retry_class();
                    if class == RetryClass::Never || attempt >= max_attempts {
                        if attempt > 1 {
                            warn!("{} failed after {} attempts: {}", op_name, attempt, e);
                        }
                        return Err(e);
                    }
                    debug!(
                        "{} failed (attempt {}/{}), retrying: {}",
                        op_name, attempt, max_attempts, e
                    );
                    if class == RetryClass::Backoff {
                        tokio::time::sleep(self.backoff).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
