//! # Initial population of a new subscription.
//!
//! Runs as its own task right after `subscribe` returns, so subscribing never waits
//! on data volume.
//!
//! ```text
//! Population::Snapshot(observer)
//!   observer.list()  ── Err ──► unversioned Error event
//!   each item ──► EventLog::append(Added(item)) ──► Feeder::offer(versioned)
//!
//! Population::Replay(from)
//!   EventLog::replay_after(from) ── Err ──► unversioned Error event
//!   each entry ──► Feeder::offer(versioned)
//! ```
//!
//! Every offer waits at most the delivery timeout; a timed-out item is skipped. The
//! task stops as soon as the subscription is closed.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::events::{Event, EventLog, ResourceKey, ResourceVersion, WatchEvent};
use crate::observers::ObserverRef;
use crate::subscribers::{Feeder, Offer};

pub(crate) enum Population<P> {
    /// Current state as `Added` events.
    Snapshot(ObserverRef<P>),
    /// Logged history strictly after a checkpoint.
    Replay(ResourceVersion),
}

pub(crate) async fn run<P: Send + Sync + 'static>(
    key: ResourceKey,
    population: Population<P>,
    log: Arc<EventLog<P>>,
    feeder: Feeder<P>,
) {
    match population {
        Population::Snapshot(observer) => snapshot(&key, observer, &log, &feeder).await,
        Population::Replay(from) => replay(&key, &from, &log, &feeder).await,
    }
}

async fn snapshot<P: Send + Sync + 'static>(
    key: &ResourceKey,
    observer: ObserverRef<P>,
    log: &EventLog<P>,
    feeder: &Feeder<P>,
) {
    let listed = tokio::select! {
        biased;
        _ = feeder.closed() => return,
        listed = observer.list() => listed,
    };
    let items = match listed {
        Ok(items) => items,
        Err(e) => {
            warn!(key = %key, subscription = %feeder.handle(), error = %e, "snapshot failed");
            feeder
                .offer(WatchEvent::unversioned(Event::error(e.as_message())))
                .await;
            return;
        }
    };

    let total = items.len();
    let mut skipped = 0usize;
    for item in items {
        // a closed subscription (unsubscribe, shutdown) must not log anything more
        if feeder.is_closed() {
            return;
        }
        let event = Arc::new(Event::added(item));
        let version = log.append(key, Arc::clone(&event)).await;
        match feeder.offer(WatchEvent::versioned(event, version)).await {
            Offer::Delivered => {}
            Offer::TimedOut => skipped += 1,
            Offer::Closed => return,
        }
    }
    debug!(key = %key, subscription = %feeder.handle(), total, skipped, "snapshot delivered");
}

async fn replay<P: Send + Sync + 'static>(
    key: &ResourceKey,
    from: &ResourceVersion,
    log: &EventLog<P>,
    feeder: &Feeder<P>,
) {
    let history = match log.replay_after(key, from).await {
        Ok(history) => history,
        Err(e) => {
            debug!(key = %key, subscription = %feeder.handle(), error = %e, "replay refused; consumer must resync");
            feeder
                .offer(WatchEvent::unversioned(Event::error(e.as_message())))
                .await;
            return;
        }
    };

    let total = history.len();
    let mut skipped = 0usize;
    for event in history {
        match feeder.offer(event).await {
            Offer::Delivered => {}
            Offer::TimedOut => skipped += 1,
            Offer::Closed => return,
        }
    }
    debug!(key = %key, subscription = %feeder.handle(), from = %from, total, skipped, "replay delivered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObserverError;
    use crate::observers::Observer;
    use crate::subscribers::{SubscriberSet, SubscriptionHandle};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn key() -> ResourceKey {
        ResourceKey::new("test", "v1", "things", "default", "populate")
    }

    /// Lists two items, closing every subscription on the way out.
    struct ClosesWhileListing {
        set: Arc<Mutex<SubscriberSet<String>>>,
    }

    #[async_trait]
    impl Observer for ClosesWhileListing {
        type Item = String;

        fn name(&self) -> &str {
            "closing"
        }

        async fn watch(
            &self,
            _ctx: CancellationToken,
        ) -> Result<mpsc::Receiver<Event<String>>, ObserverError> {
            Ok(mpsc::channel(1).1)
        }

        async fn list(&self) -> Result<Vec<String>, ObserverError> {
            self.set.lock().unwrap().close_all();
            Ok(vec!["a".to_string(), "b".to_string()])
        }
    }

    #[tokio::test]
    async fn snapshot_logs_nothing_once_the_subscription_is_closed() {
        let set = Arc::new(Mutex::new(SubscriberSet::new(key())));
        let (tx, mut rx) = mpsc::channel(4);
        let feeder = set
            .lock()
            .unwrap()
            .insert(SubscriptionHandle::new(1), tx, Duration::from_millis(10));
        let observer: ObserverRef<String> = Arc::new(ClosesWhileListing { set });
        let log = Arc::new(EventLog::new(10));

        run(key(), Population::Snapshot(observer), Arc::clone(&log), feeder).await;

        assert_eq!(log.len(&key()).await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn replay_delivers_history_after_the_checkpoint() {
        let set = Arc::new(Mutex::new(SubscriberSet::<String>::new(key())));
        let (tx, mut rx) = mpsc::channel(4);
        let feeder = set
            .lock()
            .unwrap()
            .insert(SubscriptionHandle::new(1), tx, Duration::from_millis(10));
        let log = Arc::new(EventLog::new(10));
        let from = log.append(&key(), Arc::new(Event::added("a".to_string()))).await;
        log.append(&key(), Arc::new(Event::added("b".to_string()))).await;

        run(key(), Population::Replay(from), Arc::clone(&log), feeder).await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.payload().map(String::as_str), Some("b"));
    }
}
