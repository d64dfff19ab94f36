//! # Registry: resource keys bound to their observers.
//!
//! Owns one [`Registration`] per key: the observer, the key's subscriber set, and the
//! handle of the ingest actor spawned for it.
//!
//! ## Architecture
//! ```text
//! Dispatcher::register(key, observer)
//!     └─► Registry::register
//!            ├─ write lock: key taken?  ──► AlreadyRegistered (no state change)
//!            ├─ runtime stopped?        ──► Stopped
//!            └─ insert Registration + spawn IngestActor::run(child token)
//!
//! Dispatcher::shutdown
//!     └─► Registry::drain ──► (key, Registration) for cancel / join / close
//! ```
//!
//! ## Rules
//! - Check and insert happen under one write lock, so concurrent registrations of
//!   the same key cannot both succeed.
//! - Each ingest actor gets a child of the runtime token.
//! - No observer call is made while the registry lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::ingest::{IngestActor, IngestExit, IngestState};
use crate::error::WatchError;
use crate::events::{EventLog, ResourceKey};
use crate::observers::ObserverRef;
use crate::subscribers::SubscriberSet;

/// One observer bound to one key.
pub(crate) struct Registration<P> {
    observer: ObserverRef<P>,
    subscribers: Arc<RwLock<SubscriberSet<P>>>,
    join: Mutex<Option<JoinHandle<IngestExit>>>,
    cancel: CancellationToken,
}

impl<P> Registration<P> {
    pub(crate) fn observer(&self) -> ObserverRef<P> {
        Arc::clone(&self.observer)
    }

    pub(crate) fn subscribers(&self) -> &RwLock<SubscriberSet<P>> {
        &self.subscribers
    }

    pub(crate) async fn state(&self) -> IngestState {
        match self.join.lock().await.as_ref() {
            Some(join) if !join.is_finished() => IngestState::Running,
            _ => IngestState::Stopped,
        }
    }

    /// Cancels the ingest actor and hands out its join handle (once).
    pub(crate) async fn stop(&self) -> Option<JoinHandle<IngestExit>> {
        self.cancel.cancel();
        self.join.lock().await.take()
    }
}

pub(crate) struct Registry<P> {
    entries: RwLock<HashMap<ResourceKey, Arc<Registration<P>>>>,
    log: Arc<EventLog<P>>,
    runtime_token: CancellationToken,
}

impl<P: Send + Sync + 'static> Registry<P> {
    pub(crate) fn new(log: Arc<EventLog<P>>, runtime_token: CancellationToken) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            log,
            runtime_token,
        }
    }

    /// Binds `observer` to `key` and starts its ingest actor.
    pub(crate) async fn register(
        &self,
        key: ResourceKey,
        observer: ObserverRef<P>,
    ) -> Result<(), WatchError> {
        let mut entries = self.entries.write().await;
        if self.runtime_token.is_cancelled() {
            return Err(WatchError::Stopped);
        }
        if entries.contains_key(&key) {
            return Err(WatchError::AlreadyRegistered { key });
        }

        let subscribers = Arc::new(RwLock::new(SubscriberSet::new(key.clone())));
        let cancel = self.runtime_token.child_token();
        let actor = IngestActor {
            key: key.clone(),
            observer: Arc::clone(&observer),
            log: Arc::clone(&self.log),
            subscribers: Arc::clone(&subscribers),
        };
        let token = cancel.clone();
        let join = tokio::spawn(async move { actor.run(token).await });

        info!(key = %key, observer = observer.name(), "observer registered");
        entries.insert(
            key,
            Arc::new(Registration {
                observer,
                subscribers,
                join: Mutex::new(Some(join)),
                cancel,
            }),
        );
        Ok(())
    }

    pub(crate) async fn get(&self, key: &ResourceKey) -> Option<Arc<Registration<P>>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Registered keys, sorted.
    pub(crate) async fn keys(&self) -> Vec<ResourceKey> {
        let entries = self.entries.read().await;
        let mut keys: Vec<ResourceKey> = entries.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Removes every registration.
    pub(crate) async fn drain(&self) -> Vec<(ResourceKey, Arc<Registration<P>>)> {
        let mut entries = self.entries.write().await;
        entries.drain().collect()
    }
}
