//! # Consumer side of a subscription.
//!
//! [`Dispatcher::subscribe`](crate::Dispatcher::subscribe) returns a [`Subscription`]:
//! the receive half of a bounded delivery queue plus the [`SubscriptionHandle`]
//! needed to unsubscribe. The dispatcher owns the send half.
//!
//! ## Lifecycle
//! ```text
//! subscribe() ──► Active ──► unsubscribe(handle) / dispatcher shutdown ──► Closed
//!                                                                (recv() → None)
//! ```
//!
//! ## Ordering
//! Live events arrive in log order. Right after subscribing, snapshot or replay items
//! are offered by a separate task and may interleave with live events; de-duplicate
//! by [`ResourceVersion`](crate::ResourceVersion) if exact order matters.
//!
//! ## Example
//! ```rust,no_run
//! use futures::StreamExt;
//! # async fn demo(mut sub: watchvisor::Subscription<String>) {
//! while let Some(ev) = sub.next().await {
//!     println!("{} {:?} @ {:?}", ev.kind(), ev.payload(), ev.resource_version());
//! }
//! # }
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::events::{ResourceKey, WatchEvent};

/// Opaque identity of one subscription, unique within its dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receive half of a subscription's delivery queue.
///
/// Ends (`recv()` returns `None`) once the subscription is closed and drained.
pub struct Subscription<P> {
    key: ResourceKey,
    handle: SubscriptionHandle,
    rx: mpsc::Receiver<WatchEvent<P>>,
}

impl<P> Subscription<P> {
    pub(crate) fn new(
        key: ResourceKey,
        handle: SubscriptionHandle,
        rx: mpsc::Receiver<WatchEvent<P>>,
    ) -> Self {
        Self { key, handle, rx }
    }

    /// Handle to pass to [`Dispatcher::unsubscribe`](crate::Dispatcher::unsubscribe).
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// The watched resource.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Waits for the next event; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<WatchEvent<P>> {
        self.rx.recv().await
    }

    /// Takes an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<WatchEvent<P>> {
        self.rx.try_recv().ok()
    }

    /// Number of events waiting in the queue.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Splits into the handle and the raw receiver.
    pub fn into_parts(self) -> (SubscriptionHandle, mpsc::Receiver<WatchEvent<P>>) {
        (self.handle, self.rx)
    }
}

impl<P> Stream for Subscription<P> {
    type Item = WatchEvent<P>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<P> fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("handle", &self.handle)
            .field("queued", &self.rx.len())
            .finish()
    }
}
