//! # IngestActor: drives one key's observer stream.
//!
//! One actor runs per registered key. It is the only task that appends live
//! events to that key's log and the only one that fans them out.
//!
//! ## Flow
//! ```text
//! run(token)
//!   ├─► observer.watch(token)          (cancellable; no lock held)
//!   │     └─ Err ──► append Error event + fan-out ──► SetupFailed
//!   └─► loop {
//!         rx.recv() ── None ──────► SourceClosed
//!         token     ── cancelled ─► Cancelled
//!         event ──► EventLog::append ──► WatchEvent{version} ──► SubscriberSet::emit
//!       }
//! ```
//!
//! ## Rules
//! - The observer is never restarted; a failed or closed stream ends ingestion for the key.
//! - Fan-out happens under the set's read lock and never awaits a consumer.
//! - Subscriptions stay open after the actor exits; the log stays queryable.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventLog, ResourceKey, WatchEvent};
use crate::observers::ObserverRef;
use crate::subscribers::SubscriberSet;

/// Lifecycle of a key's ingest task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// The observer stream is being consumed.
    Running,
    /// Terminal: the stream closed, setup failed, or the dispatcher shut down.
    Stopped,
}

/// Why an ingest actor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IngestExit {
    SetupFailed,
    SourceClosed,
    Cancelled,
}

pub(crate) struct IngestActor<P> {
    pub(crate) key: ResourceKey,
    pub(crate) observer: ObserverRef<P>,
    pub(crate) log: Arc<EventLog<P>>,
    pub(crate) subscribers: Arc<RwLock<SubscriberSet<P>>>,
}

impl<P: Send + Sync + 'static> IngestActor<P> {
    /// Consumes the observer stream until it closes or `token` is cancelled.
    pub(crate) async fn run(self, token: CancellationToken) -> IngestExit {
        let watch = tokio::select! {
            biased;
            _ = token.cancelled() => return IngestExit::Cancelled,
            res = self.observer.watch(token.clone()) => res,
        };
        let mut rx = match watch {
            Ok(rx) => rx,
            Err(e) => {
                error!(key = %self.key, observer = self.observer.name(), error = %e, "observer setup failed; ingestion stopped");
                self.publish(Event::error(e.as_message())).await;
                return IngestExit::SetupFailed;
            }
        };
        info!(key = %self.key, observer = self.observer.name(), "ingest running");

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    debug!(key = %self.key, "ingest cancelled");
                    return IngestExit::Cancelled;
                }
                next = rx.recv() => next,
            };
            match next {
                Some(event) => {
                    if event.is_error() {
                        warn!(key = %self.key, reason = event.reason.as_deref().unwrap_or_default(), "observer reported an error");
                    }
                    self.publish(event).await;
                }
                None => {
                    info!(key = %self.key, "observer stream closed; ingestion stopped");
                    return IngestExit::SourceClosed;
                }
            }
        }
    }

    /// Appends `event` to the log and offers the versioned envelope to every subscriber.
    async fn publish(&self, event: Event<P>) {
        let event = Arc::new(event);
        let version = self.log.append(&self.key, Arc::clone(&event)).await;
        let out = WatchEvent::versioned(event, version);
        self.subscribers.read().await.emit(&out);
    }
}
