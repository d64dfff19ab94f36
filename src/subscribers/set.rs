//! # SubscriberSet: non-blocking fan-out over one key's subscriptions
//!
//! [`SubscriberSet`] holds the send half of every live subscription for a resource
//! key and distributes each versioned event to all of them **without awaiting**.
//!
//! ## What it guarantees
//! - `emit(&WatchEvent)` returns immediately (`try_send`).
//! - Per-subscription FIFO (queue order = log order).
//! - A full queue drops the event for that subscription only and bumps its `dropped` counter.
//! - After `remove(handle)` no further event is enqueued by the set, and a
//!   population [`Feeder`] stops at its next offer.
//! - A subscription whose receiver was dropped is pruned on the next insert/remove.
//!
//! ## What it does **not** guarantee
//! - No retries on overflow: slow consumers lose freshness and fall back to replay.
//!
//! ## Diagram
//! ```text
//!    emit(&WatchEvent)               (Arc-clone per subscription)
//!        ├────────────────► [queue S1] ─► consumer S1
//!        ├────────────────► [queue S2] ─► consumer S2
//!        └────────────────► [queue SN] ─► consumer SN
//!
//!    Feeder (snapshot/replay task) ── weak sender ──► [queue Sx]
//! ```
//!
//! The dispatcher guards each set with an `RwLock`: fan-out takes the read lock,
//! subscribe/unsubscribe take the write lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::events::{ResourceKey, WatchEvent};
use crate::subscribers::SubscriptionHandle;

/// Send half of one subscription plus its bookkeeping.
struct SubscriberChannel<P> {
    sender: mpsc::Sender<WatchEvent<P>>,
    closed: CancellationToken,
    dropped: AtomicU64,
}

/// Live subscriptions of one resource key.
pub(crate) struct SubscriberSet<P> {
    key: ResourceKey,
    channels: HashMap<SubscriptionHandle, Arc<SubscriberChannel<P>>>,
}

impl<P: Send + Sync + 'static> SubscriberSet<P> {
    pub(crate) fn new(key: ResourceKey) -> Self {
        Self {
            key,
            channels: HashMap::new(),
        }
    }

    /// Adds a subscription and returns the feeder used to populate it.
    pub(crate) fn insert(
        &mut self,
        handle: SubscriptionHandle,
        sender: mpsc::Sender<WatchEvent<P>>,
        delivery_timeout: Duration,
    ) -> Feeder<P> {
        self.prune_closed();
        let channel = Arc::new(SubscriberChannel {
            sender,
            closed: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        });
        let feeder = Feeder {
            handle,
            weak: channel.sender.downgrade(),
            closed: channel.closed.clone(),
            timeout: delivery_timeout,
        };
        self.channels.insert(handle, channel);
        feeder
    }

    /// Removes and closes a subscription. Returns `false` if it was already gone.
    pub(crate) fn remove(&mut self, handle: SubscriptionHandle) -> bool {
        let removed = match self.channels.remove(&handle) {
            Some(channel) => {
                channel.closed.cancel();
                true
            }
            None => false,
        };
        self.prune_closed();
        removed
    }

    /// Forgets subscriptions whose consumer dropped the receiver without unsubscribing.
    fn prune_closed(&mut self) {
        let key = &self.key;
        self.channels.retain(|handle, channel| {
            if channel.sender.is_closed() {
                channel.closed.cancel();
                debug!(key = %key, subscription = %handle, "consumer gone; subscription pruned");
                false
            } else {
                true
            }
        });
    }

    /// Closes every subscription.
    pub(crate) fn close_all(&mut self) {
        for (_, channel) in self.channels.drain() {
            channel.closed.cancel();
        }
    }

    /// Fans one event out to every subscription (non-blocking).
    ///
    /// A full queue drops the event for that subscription only. A queue whose
    /// consumer went away without unsubscribing is skipped until the next
    /// insert or remove prunes it.
    pub(crate) fn emit(&self, event: &WatchEvent<P>) {
        for (handle, channel) in &self.channels {
            match channel.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let dropped = channel.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(
                        key = %self.key,
                        subscription = %handle,
                        dropped,
                        "queue full; event dropped for this subscriber"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(key = %self.key, subscription = %handle, "consumer gone; skipped");
                }
            }
        }
    }

    /// Events dropped on overflow for `handle` so far.
    pub(crate) fn dropped(&self, handle: SubscriptionHandle) -> Option<u64> {
        self.channels
            .get(&handle)
            .map(|c| c.dropped.load(Ordering::Relaxed))
    }

    pub(crate) fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Outcome of offering one population item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Delivered,
    /// Queue stayed full for the whole timeout; item skipped.
    TimedOut,
    /// Subscription was closed; stop populating.
    Closed,
}

/// Population-side access to one subscription's queue.
///
/// Holds only a weak sender, so an unsubscribed queue closes as soon as any
/// in-flight offer returns.
pub(crate) struct Feeder<P> {
    handle: SubscriptionHandle,
    weak: mpsc::WeakSender<WatchEvent<P>>,
    closed: CancellationToken,
    timeout: Duration,
}

impl<P> Feeder<P> {
    pub(crate) fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Completes once the subscription is removed or the dispatcher closes it.
    pub(crate) async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Offers `event`, waiting up to the delivery timeout for queue space.
    pub(crate) async fn offer(&self, event: WatchEvent<P>) -> Offer {
        if self.is_closed() {
            return Offer::Closed;
        }
        let Some(sender) = self.weak.upgrade() else {
            return Offer::Closed;
        };
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Offer::Closed,
            res = sender.send_timeout(event, self.timeout) => match res {
                Ok(()) => Offer::Delivered,
                Err(SendTimeoutError::Timeout(_)) => Offer::TimedOut,
                Err(SendTimeoutError::Closed(_)) => Offer::Closed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, ResourceVersion};

    fn key() -> ResourceKey {
        ResourceKey::new("core", "v1", "file", "default", "set")
    }

    fn ev(n: u64) -> WatchEvent<u64> {
        WatchEvent::versioned(Arc::new(Event::added(n)), ResourceVersion::new(1, n))
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_that_subscriber() {
        let mut set = SubscriberSet::new(key());
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(16);
        let slow = SubscriptionHandle::new(1);
        let fast = SubscriptionHandle::new(2);
        set.insert(slow, slow_tx, Duration::from_millis(10));
        set.insert(fast, fast_tx, Duration::from_millis(10));

        for n in 1..=5 {
            set.emit(&ev(n));
        }

        assert_eq!(set.dropped(slow), Some(4));
        assert_eq!(set.dropped(fast), Some(0));
        assert_eq!(slow_rx.recv().await.unwrap().payload(), Some(&1));
        for n in 1..=5 {
            assert_eq!(fast_rx.recv().await.unwrap().payload(), Some(&n));
        }
    }

    #[tokio::test]
    async fn removed_subscription_closes_and_stops_feeder() {
        let mut set = SubscriberSet::new(key());
        let (tx, mut rx) = mpsc::channel(4);
        let handle = SubscriptionHandle::new(7);
        let feeder = set.insert(handle, tx, Duration::from_millis(10));

        assert_eq!(feeder.offer(ev(1)).await, Offer::Delivered);
        assert!(set.remove(handle));
        assert!(!set.remove(handle));
        assert_eq!(feeder.offer(ev(2)).await, Offer::Closed);

        set.emit(&ev(3));
        assert_eq!(rx.recv().await.unwrap().payload(), Some(&1));
        assert!(rx.recv().await.is_none());
        assert_eq!(set.len(), 0);
    }

    #[tokio::test]
    async fn abandoned_receivers_are_pruned_on_the_next_change() {
        let mut set = SubscriberSet::new(key());
        let (gone_tx, gone_rx) = mpsc::channel(4);
        let (kept_tx, _kept_rx) = mpsc::channel(4);
        let gone = SubscriptionHandle::new(1);
        let gone_feeder = set.insert(gone, gone_tx, Duration::from_millis(10));
        set.insert(SubscriptionHandle::new(2), kept_tx, Duration::from_millis(10));

        drop(gone_rx);
        set.emit(&ev(1));
        assert_eq!(set.len(), 2);

        let (tx, _rx) = mpsc::channel(4);
        set.insert(SubscriptionHandle::new(3), tx, Duration::from_millis(10));
        assert_eq!(set.len(), 2);
        assert_eq!(set.dropped(gone), None);
        assert_eq!(gone_feeder.offer(ev(2)).await, Offer::Closed);
    }

    #[tokio::test]
    async fn feeder_times_out_on_a_full_queue() {
        let mut set = SubscriberSet::new(key());
        let (tx, _rx) = mpsc::channel(1);
        let feeder = set.insert(SubscriptionHandle::new(1), tx, Duration::from_millis(20));
        assert_eq!(feeder.offer(ev(1)).await, Offer::Delivered);
        assert_eq!(feeder.offer(ev(2)).await, Offer::TimedOut);
    }
}
