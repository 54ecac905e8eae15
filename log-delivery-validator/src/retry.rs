//! # Retry
//!
//! Fixed-interval retry for throttled destination calls.
use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tracing::warn;

use crate::error::DestinationError;

/// Retries throttled calls after a fixed pause. A limit of `None` means no limit, so
/// the default policy retries until the destination stops throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between a throttled call and the next attempt.
    pub interval: Duration,
    /// Total calls allowed, including the first one.
    pub max_attempts: Option<u32>,
    /// Time budget measured from the first call.
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            max_elapsed: None,
        }
    }

    /// 0 means unlimited.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = (attempts > 0).then_some(attempts);
        self
    }

    /// A zero duration means unlimited.
    pub fn max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = (!elapsed.is_zero()).then_some(elapsed);
        self
    }

    /// Runs `call` until it succeeds or fails with a non-transient error. Every
    /// attempt is made with whatever `call` captured, so the request is identical
    /// each time.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, DestinationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DestinationError>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
                    let out_of_time = self
                        .max_elapsed
                        .is_some_and(|max| started.elapsed() + self.interval > max);
                    if out_of_attempts || out_of_time {
                        return Err(DestinationError::RetriesExhausted {
                            operation,
                            attempts,
                        });
                    }
                    warn!(
                        "{} throttled (attempt {}), retrying in {:?}: {}",
                        operation, attempts, self.interval, err
                    );
                    tokio::time::sleep(self.interval).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
