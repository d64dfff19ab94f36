//! # Dispatcher: registration, ingest, fan-out and subscriptions.
//!
//! The [`Dispatcher`] owns the observer registry and the [`EventLog`]. It runs one
//! ingest actor per registered key and hands out [`Subscription`]s.
//!
//! ## Architecture
//! ```text
//! register(key, observer) ──► Registry ──► spawn IngestActor::run(child token)
//!
//! IngestActor:
//!   observer.watch(token) ──► Event ──► EventLog::append ──► WatchEvent{version}
//!                                                     └──► SubscriberSet::emit (try_send, drop on full)
//!
//! subscribe(key, from) ──► new bounded queue in SubscriberSet ──► Subscription (returned at once)
//!                      └─► spawn population:
//!                             from = None     → observer.list() as Added events (logged)
//!                             from = Some(v)  → EventLog::replay_after(v)
//!                             failure         → one unversioned Error event
//!
//! unsubscribe(key, handle) ──► remove from SubscriberSet ──► queue closes
//!
//! shutdown() ──► cancel runtime token ──► join ingest (grace) ──► close subscriptions ──► clear logs
//! ```
//!
//! ## Rules
//! - `register` of a taken key fails with `AlreadyRegistered`; the running observer is untouched.
//! - Only `NoSuchResource` and `Stopped` are returned synchronously by `subscribe`.
//!   Replay and snapshot failures reach the consumer as an `Error` event without a version.
//! - Live events arrive in log order. Population may interleave with them right
//!   after subscribing.
//! - A finished observer stream leaves its subscriptions open; they close on
//!   `unsubscribe` or `shutdown`.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use watchvisor::{Dispatcher, FileObserver, PollConfig, ResourceKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::default();
//!     let key = ResourceKey::new("fs", "v1", "dirs", "local", "tmp");
//!     let observer = FileObserver::new("/tmp", PollConfig::every(Duration::from_secs(1)));
//!     dispatcher.register(key.clone(), observer).await?;
//!
//!     let mut sub = dispatcher.subscribe(&key, None).await?;
//!     while let Some(ev) = sub.recv().await {
//!         println!("{} {:?}", ev.kind(), ev.resource_version());
//!     }
//!     dispatcher.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::DispatcherConfig;
use crate::core::ingest::IngestState;
use crate::core::populate::{self, Population};
use crate::core::registry::Registry;
use crate::core::shutdown;
use crate::error::{RuntimeError, WatchError};
use crate::events::{EventLog, ResourceKey, ResourceVersion};
use crate::observers::{Observer, ObserverRef};
use crate::subscribers::{Subscription, SubscriptionHandle};

/// In-process watch server for resources of payload type `P`.
///
/// Independent instances share nothing; create as many as needed.
pub struct Dispatcher<P> {
    cfg: DispatcherConfig,
    log: Arc<EventLog<P>>,
    registry: Registry<P>,
    next_handle: AtomicU64,
    runtime_token: CancellationToken,
}

impl<P: Send + Sync + 'static> Dispatcher<P> {
    /// Creates a dispatcher with the given configuration.
    pub fn new(cfg: DispatcherConfig) -> Self {
        let log = Arc::new(EventLog::new(cfg.log_capacity_clamped()));
        let runtime_token = CancellationToken::new();
        Self {
            registry: Registry::new(Arc::clone(&log), runtime_token.clone()),
            log,
            cfg,
            next_handle: AtomicU64::new(0),
            runtime_token,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.cfg
    }

    /// Binds `observer` to `key` and starts ingesting its events.
    ///
    /// ### Errors
    /// - [`WatchError::AlreadyRegistered`] if the key is taken (nothing changes)
    /// - [`WatchError::Stopped`] after [`shutdown`](Self::shutdown)
    pub async fn register<O>(&self, key: ResourceKey, observer: O) -> Result<(), WatchError>
    where
        O: Observer<Item = P>,
    {
        self.register_shared(key, Arc::new(observer)).await
    }

    /// Same as [`register`](Self::register) for an already shared observer.
    pub async fn register_shared(
        &self,
        key: ResourceKey,
        observer: ObserverRef<P>,
    ) -> Result<(), WatchError> {
        self.registry.register(key, observer).await
    }

    /// Opens a subscription on `key`.
    ///
    /// With `from = None` the subscription is first populated with the observer's
    /// current state as `Added` events (each logged and versioned). With
    /// `from = Some(v)` it is populated with every logged event after `v`; if `v` is
    /// unknown or evicted, a single `Error` event without a version is delivered
    /// instead and the consumer should re-subscribe without a checkpoint.
    ///
    /// Returns immediately; population runs in the background.
    ///
    /// ### Errors
    /// - [`WatchError::NoSuchResource`] if no observer is registered for `key`
    /// - [`WatchError::Stopped`] after [`shutdown`](Self::shutdown)
    pub async fn subscribe(
        &self,
        key: &ResourceKey,
        from: Option<ResourceVersion>,
    ) -> Result<Subscription<P>, WatchError> {
        if self.runtime_token.is_cancelled() {
            return Err(WatchError::Stopped);
        }
        let registration = self
            .registry
            .get(key)
            .await
            .ok_or_else(|| WatchError::NoSuchResource { key: key.clone() })?;

        let handle = SubscriptionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity_clamped());
        let feeder = {
            let mut set = registration.subscribers().write().await;
            if self.runtime_token.is_cancelled() {
                return Err(WatchError::Stopped);
            }
            set.insert(handle, tx, self.cfg.delivery_timeout)
        };

        let population = match from {
            None => Population::Snapshot(registration.observer()),
            Some(version) => Population::Replay(version),
        };
        debug!(key = %key, subscription = %handle, "subscribed");
        tokio::spawn(populate::run(
            key.clone(),
            population,
            Arc::clone(&self.log),
            feeder,
        ));
        Ok(Subscription::new(key.clone(), handle, rx))
    }

    /// Like [`subscribe`](Self::subscribe) with the checkpoint in its text form.
    ///
    /// An empty string means "no checkpoint". Text that is not a resource version
    /// fails with [`WatchError::VersionNotFound`].
    pub async fn subscribe_from_str(
        &self,
        key: &ResourceKey,
        resource_version: &str,
    ) -> Result<Subscription<P>, WatchError> {
        let from = if resource_version.is_empty() {
            None
        } else {
            let version = resource_version
                .parse::<ResourceVersion>()
                .map_err(|_| WatchError::VersionNotFound {
                    key: key.clone(),
                    version: resource_version.to_string(),
                })?;
            Some(version)
        };
        self.subscribe(key, from).await
    }

    /// Removes the subscription and closes its queue. Unknown handles are ignored.
    ///
    /// Events already queued stay readable; nothing is enqueued afterwards.
    pub async fn unsubscribe(&self, key: &ResourceKey, handle: SubscriptionHandle) {
        let Some(registration) = self.registry.get(key).await else {
            return;
        };
        if registration.subscribers().write().await.remove(handle) {
            debug!(key = %key, subscription = %handle, "unsubscribed");
        }
    }

    /// Registered keys, sorted.
    pub async fn keys(&self) -> Vec<ResourceKey> {
        self.registry.keys().await
    }

    /// State of the key's ingest task, `None` if the key is not registered.
    pub async fn ingest_state(&self, key: &ResourceKey) -> Option<IngestState> {
        let registration = self.registry.get(key).await?;
        Some(registration.state().await)
    }

    /// Number of open subscriptions on `key`.
    pub async fn subscriber_count(&self, key: &ResourceKey) -> usize {
        match self.registry.get(key).await {
            Some(registration) => registration.subscribers().read().await.len(),
            None => 0,
        }
    }

    /// Live events dropped so far for one subscription because its queue was full.
    pub async fn dropped(&self, key: &ResourceKey, handle: SubscriptionHandle) -> Option<u64> {
        let registration = self.registry.get(key).await?;
        let set = registration.subscribers().read().await;
        set.dropped(handle)
    }

    /// The shared event log.
    pub fn log(&self) -> &EventLog<P> {
        &self.log
    }

    /// Stops every ingest task, closes every subscription and clears the logs.
    ///
    /// Ingest tasks get [`DispatcherConfig::grace`] to stop; the ones still running
    /// afterwards are aborted and reported in [`RuntimeError::GraceExceeded`].
    /// Further `register`/`subscribe` calls fail with [`WatchError::Stopped`].
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        info!("dispatcher shutdown requested");
        self.runtime_token.cancel();

        let registrations = self.registry.drain().await;
        let mut joins = Vec::with_capacity(registrations.len());
        for (key, registration) in &registrations {
            if let Some(join) = registration.stop().await {
                joins.push((key.clone(), join));
            }
        }

        let grace = self.cfg.grace;
        let all = async {
            for (key, join) in joins.iter_mut() {
                if let Err(e) = join.await {
                    warn!(key = %key, error = %e, "ingest task failed");
                }
            }
        };
        let res = match tokio::time::timeout(grace, all).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let mut stuck = Vec::new();
                for (key, join) in &joins {
                    if !join.is_finished() {
                        join.abort();
                        stuck.push(key.clone());
                    }
                }
                stuck.sort_unstable();
                warn!(?grace, stuck = stuck.len(), "ingest tasks did not stop in time; aborted");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };

        for (_, registration) in &registrations {
            registration.subscribers().write().await.close_all();
        }
        self.log.clear().await;
        info!(keys = registrations.len(), "dispatcher stopped");
        res
    }

    /// Waits for a termination signal (or another caller's shutdown), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        tokio::select! {
            _ = self.runtime_token.cancelled() => Ok(()),
            signal = shutdown::termination_signal() => {
                let name = signal.map_err(RuntimeError::Signal)?;
                info!(signal = name, "termination signal received");
                self.shutdown().await
            }
        }
    }
}

impl<P: Send + Sync + 'static> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl<P> Drop for Dispatcher<P> {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}
