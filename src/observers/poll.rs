//! # Shared machinery for polling observers.
//!
//! [`PollConfig`] holds the cadence and setup-retry knobs; the helpers here give
//! every polling observer the same cancellable tick and retry loop.
//!
//! ```text
//! watch(ctx)
//!   ├─► setup (initial scan / ref lookup), retried per RetryPolicy, cancellable
//!   └─► spawn loop {
//!         tick(ctx)  ── cancelled ──► close stream
//!         poll once  ── changes   ──► send events (cancellable)
//!       }
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ObserverError;
use crate::events::Event;
use crate::policies::{Jitter, RetryPolicy};

/// Polling cadence and setup retry for the reference observers.
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    /// Time between two polls.
    pub interval: Duration,
    /// Randomization of each interval.
    pub jitter: Jitter,
    /// Retry of the initial setup inside `watch`.
    pub retry: RetryPolicy,
    /// Capacity of the observer's outgoing event stream (min 1).
    pub stream_capacity: usize,
}

impl Default for PollConfig {
    /// - `interval = 5s`
    /// - `jitter = None`
    /// - `retry = RetryPolicy::default()` (3 attempts)
    /// - `stream_capacity = 10`
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            jitter: Jitter::None,
            retry: RetryPolicy::default(),
            stream_capacity: 10,
        }
    }
}

impl PollConfig {
    /// Polls every `interval`, otherwise default.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Replaces the setup retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn channel<P>(&self) -> (mpsc::Sender<Event<P>>, mpsc::Receiver<Event<P>>) {
        mpsc::channel(self.stream_capacity.max(1))
    }

    /// Sleeps one (jittered) interval. Returns `false` if `ctx` was cancelled first.
    pub(crate) async fn tick(&self, ctx: &CancellationToken) -> bool {
        let delay = self.jitter.apply(self.interval);
        tokio::select! {
            _ = ctx.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Runs `op` until it succeeds, the retry budget is spent, or `ctx` is cancelled.
    ///
    /// Only retryable errors are retried. The final failure is reported as
    /// [`ObserverError::Setup`].
    pub(crate) async fn setup<T, F, Fut>(
        &self,
        observer: &str,
        ctx: &CancellationToken,
        mut op: F,
    ) -> Result<T, ObserverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ObserverError>>,
    {
        let attempts = self.retry.attempts();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if attempt >= attempts || !err.is_retryable() || ctx.is_cancelled() {
                return Err(ObserverError::Setup {
                    observer: observer.to_string(),
                    error: err.to_string(),
                });
            }

            let delay = self.retry.delay(attempt - 1);
            warn!(observer, attempt, ?delay, error = %err, "setup failed; retrying");
            tokio::select! {
                _ = ctx.cancelled() => {
                    return Err(ObserverError::Setup {
                        observer: observer.to_string(),
                        error: format!("cancelled after: {err}"),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Sends `events` in order; returns `false` if the stream is gone or `ctx` was cancelled.
pub(crate) async fn send_all<P>(
    tx: &mpsc::Sender<Event<P>>,
    ctx: &CancellationToken,
    events: Vec<Event<P>>,
) -> bool {
    for ev in events {
        tokio::select! {
            _ = ctx.cancelled() => return false,
            res = tx.send(ev) => if res.is_err() { return false; },
        }
    }
    true
}
