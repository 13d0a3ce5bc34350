//! Polling with a bounded time budget
//!
//! UI rendering is eventually consistent with the action that caused it,
//! so assertions re-evaluate a read until it matches or the budget runs
//! out. Time is measured with `tokio::time` so tests can run paused.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::trace;

use crate::error::{E2eResult, Mismatch};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Run `read` until `check` accepts its value or the timeout elapses.
    ///
    /// The read is always started at least once, and is cut off when it
    /// would run past the timeout. Read errors count as observations and
    /// are retried.
    pub async fn until<T, P, Fut, C>(
        &self,
        what: &str,
        expected: impl Into<String>,
        mut read: P,
        check: C,
    ) -> Result<T, Mismatch>
    where
        T: Debug,
        P: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
        C: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // A single read may not outlive the remaining budget
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let observed = match timeout(remaining, read()).await {
                Ok(Ok(value)) if check(&value) => return Ok(value),
                Ok(Ok(value)) => format!("{:?}", value),
                Ok(Err(e)) => format!("error: {}", e),
                Err(_) => format!("read still pending after {} ms", remaining.as_millis()),
            };

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(Mismatch {
                    what: what.to_string(),
                    expected: expected.into(),
                    last_observed: observed,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            trace!("{} not met after {} attempt(s): {}", what, attempts, observed);

            let remaining = self.timeout - elapsed;
            sleep(self.interval.min(remaining)).await;
        }
    }
}
