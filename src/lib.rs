//! # watchvisor
//!
//! **Watchvisor** is an in-process resource-watch event distribution library.
//!
//! Observers report changes to resources (a directory tree, a remote git branch,
//! anything behind the [`Observer`] trait). A [`Dispatcher`] records every change in
//! a bounded, versioned per-resource log and fans it out to any number of
//! subscribers, each consuming at its own pace. Subscribers can start from a
//! snapshot of the current state or resume from a previously seen
//! [`ResourceVersion`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ FileObserver │   │ GitObserver  │   │ impl Observer│
//!     │  (key #1)    │   │  (key #2)    │   │  (key #3)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ watch(ctx)       │                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - Registry (key → observer + ingest actor + subscriber set)      │
//! │  - EventLog (per key: bounded, versioned, replayable)             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ IngestActor  │   │ IngestActor  │   │ IngestActor  │
//!     │  append →    │   │  append →    │   │  append →    │
//!     │  emit        │   │  emit        │   │  emit        │
//!     └──────┬───────┘   └──────────────┘   └──────────────┘
//!            ▼
//!      SubscriberSet (try_send; a full queue drops for that subscriber only)
//!      ┌─────────┼─────────┐
//!      ▼         ▼         ▼
//!   [queue]   [queue]   [queue]
//!      ▼         ▼         ▼
//!   Subscription  ...  Subscription   (recv() / Stream)
//! ```
//!
//! ### Subscribe
//! ```text
//! subscribe(key, None)     ──► queue ──► observer.list() → Added events (logged, versioned)
//! subscribe(key, Some(v))  ──► queue ──► EventLog::replay_after(v)
//!                                          └─ evicted/unknown v ─► one Error event (re-sync)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Register observers, subscribe, unsubscribe, shut down.          | [`Dispatcher`], [`DispatcherConfig`]        |
//! | **Events**        | Typed changes and the envelope consumers receive.               | [`Event`], [`WatchEvent`], [`ResourceKey`]  |
//! | **History**       | Bounded per-key log with replay after a checkpoint.             | [`EventLog`], [`ResourceVersion`]           |
//! | **Observers**     | Change sources: polling file tree and git branch.               | [`Observer`], [`FileObserver`], [`GitObserver`] |
//! | **Policies**      | Setup retry and poll jitter for observers.                      | [`RetryPolicy`], [`Jitter`]                 |
//! | **Errors**        | Typed errors for registration, observers and lifecycle.         | [`WatchError`], [`ObserverError`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//! use watchvisor::{Dispatcher, Event, Observer, ObserverError, ResourceKey};
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Observer for Counter {
//!     type Item = u32;
//!
//!     fn name(&self) -> &str { "counter" }
//!
//!     async fn watch(&self, ctx: CancellationToken) -> Result<mpsc::Receiver<Event<u32>>, ObserverError> {
//!         let (tx, rx) = mpsc::channel(8);
//!         tokio::spawn(async move {
//!             for n in 1..=3 {
//!                 tokio::time::sleep(Duration::from_millis(10)).await;
//!                 if ctx.is_cancelled() || tx.send(Event::modified(n)).await.is_err() {
//!                     break;
//!                 }
//!             }
//!         });
//!         Ok(rx)
//!     }
//!
//!     async fn list(&self) -> Result<Vec<u32>, ObserverError> {
//!         Ok(vec![0])
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::default();
//!     let key = ResourceKey::new("demo", "v1", "counters", "default", "one");
//!     dispatcher.register(key.clone(), Counter).await?;
//!
//!     let mut sub = dispatcher.subscribe(&key, None).await?;
//!     let first = sub.recv().await.expect("subscription open");
//!     assert!(first.resource_version().is_some());
//!
//!     dispatcher.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod observers;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Dispatcher, DispatcherConfig, IngestState};
pub use error::{ObserverError, RuntimeError, WatchError};
pub use events::{
    Event, EventKind, EventLog, ParseKeyError, ParseVersionError, ResourceKey, ResourceVersion,
    WatchEvent,
};
pub use observers::{
    FileChange, FileObserver, GitChange, GitObserver, Observer, ObserverRef, PollConfig,
};
pub use policies::{Jitter, RetryPolicy};
pub use subscribers::{Subscription, SubscriptionHandle};
