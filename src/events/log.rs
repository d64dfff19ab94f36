//! # Bounded, versioned per-key event log.
//!
//! [`EventLog`] keeps the most recent `capacity` events of every resource key, in
//! arrival order, and answers "everything after version V".
//!
//! ## Architecture
//! ```text
//! EventLog
//!   └─ RwLock<HashMap<ResourceKey, Arc<Mutex<KeyLog>>>>     (write only to create a key's log)
//!         └─ KeyLog
//!              ├─ entries: VecDeque<(Arc<Event>, ResourceVersion)>   head = absolute pos of entries[0]
//!              └─ index:   HashMap<ResourceVersion, absolute pos>
//! ```
//!
//! ## Rules
//! - A log never holds more than `capacity` entries; when full, the head is evicted
//!   (its index entry first) before the new entry is appended.
//! - Appends and lookups on one key are serialized by that key's mutex, so a lookup
//!   never sees a half-updated index. Different keys never contend.
//! - `replay_after(latest)` is an empty sequence, not an error.
//! - An evicted (or foreign) version fails with `VersionNotFound`: history is lost,
//!   the caller must re-sync from a snapshot.
//! - A key that never had an append fails with `NoSuchResource`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::WatchError;
use crate::events::{Event, ResourceKey, ResourceVersion, WatchEvent};

struct Entry<P> {
    event: Arc<Event<P>>,
    version: ResourceVersion,
}

/// Log of one resource key.
struct KeyLog<P> {
    epoch: u64,
    last_seq: u64,
    /// Absolute position of `entries[0]`.
    head: u64,
    entries: VecDeque<Entry<P>>,
    index: HashMap<ResourceVersion, u64>,
}

impl<P> KeyLog<P> {
    /// Starts empty; storage grows with use up to the log capacity.
    fn new() -> Self {
        Self {
            epoch: rand::random(),
            last_seq: 0,
            head: 0,
            entries: VecDeque::new(),
            index: HashMap::new(),
        }
    }

    fn append(&mut self, event: Arc<Event<P>>, capacity: usize) -> ResourceVersion {
        self.last_seq += 1;
        let version = ResourceVersion::new(self.epoch, self.last_seq);

        while self.entries.len() >= capacity {
            match self.entries.pop_front() {
                Some(oldest) => {
                    self.index.remove(&oldest.version);
                    self.head += 1;
                }
                None => break,
            }
        }

        let pos = self.head + self.entries.len() as u64;
        self.entries.push_back(Entry { event, version });
        self.index.insert(version, pos);
        version
    }

    fn after(&self, version: &ResourceVersion) -> Option<Vec<WatchEvent<P>>> {
        let pos = *self.index.get(version)?;
        let offset = usize::try_from(pos - self.head).ok()?;
        Some(
            self.entries
                .iter()
                .skip(offset + 1)
                .map(|e| WatchEvent::versioned(Arc::clone(&e.event), e.version))
                .collect(),
        )
    }
}

/// Size-bounded, ordered, versioned event record for every resource key.
pub struct EventLog<P> {
    capacity: usize,
    logs: RwLock<HashMap<ResourceKey, Arc<Mutex<KeyLog<P>>>>>,
}

impl<P: Send + Sync + 'static> EventLog<P> {
    /// Creates an empty log keeping at most `capacity` entries per key (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            logs: RwLock::new(HashMap::new()),
        }
    }

    /// Per-key retention.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `event` to the key's log and returns its new version.
    ///
    /// Creates the key's log on first use. Evicts the oldest entry when full.
    pub async fn append(&self, key: &ResourceKey, event: Arc<Event<P>>) -> ResourceVersion {
        let log = self.log_for(key).await;
        let mut log = log.lock().await;
        log.append(event, self.capacity)
    }

    /// Returns every entry strictly after `version`, in original order.
    ///
    /// ### Errors
    /// - [`WatchError::NoSuchResource`] if the key has no log yet
    /// - [`WatchError::VersionNotFound`] if `version` was evicted or never issued here
    pub async fn replay_after(
        &self,
        key: &ResourceKey,
        version: &ResourceVersion,
    ) -> Result<Vec<WatchEvent<P>>, WatchError> {
        let log = self
            .existing(key)
            .await
            .ok_or_else(|| WatchError::NoSuchResource { key: key.clone() })?;
        let log = log.lock().await;
        log.after(version).ok_or_else(|| WatchError::VersionNotFound {
            key: key.clone(),
            version: version.to_string(),
        })
    }

    /// Number of retained entries for `key` (0 if none).
    pub async fn len(&self, key: &ResourceKey) -> usize {
        match self.existing(key).await {
            Some(log) => log.lock().await.entries.len(),
            None => 0,
        }
    }

    /// Version of the most recent entry for `key`.
    pub async fn latest(&self, key: &ResourceKey) -> Option<ResourceVersion> {
        let log = self.existing(key).await?;
        let log = log.lock().await;
        log.entries.back().map(|e| e.version)
    }

    /// Versions currently retained for `key`, oldest first.
    pub async fn versions(&self, key: &ResourceKey) -> Vec<ResourceVersion> {
        match self.existing(key).await {
            Some(log) => log.lock().await.entries.iter().map(|e| e.version).collect(),
            None => Vec::new(),
        }
    }

    /// Drops every key's log.
    pub async fn clear(&self) {
        self.logs.write().await.clear();
    }

    async fn existing(&self, key: &ResourceKey) -> Option<Arc<Mutex<KeyLog<P>>>> {
        self.logs.read().await.get(key).cloned()
    }

    async fn log_for(&self, key: &ResourceKey) -> Arc<Mutex<KeyLog<P>>> {
        if let Some(log) = self.existing(key).await {
            return log;
        }
        let mut logs = self.logs.write().await;
        Arc::clone(
            logs.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(KeyLog::new()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResourceKey {
        ResourceKey::new("core", "v1", "file", "default", "log")
    }

    async fn fill(log: &EventLog<u32>, n: u32) -> Vec<ResourceVersion> {
        let mut out = Vec::new();
        for i in 0..n {
            out.push(log.append(&key(), Arc::new(Event::added(i))).await);
        }
        out
    }

    fn payloads(events: &[WatchEvent<u32>]) -> Vec<u32> {
        events.iter().filter_map(|e| e.payload().copied()).collect()
    }

    #[tokio::test]
    async fn keeps_only_the_most_recent_entries_in_order() {
        for (cap, n) in [(1usize, 5u32), (3, 3), (3, 10), (10, 4), (7, 50)] {
            let log = EventLog::new(cap);
            let versions = fill(&log, n).await;

            let held = log.versions(&key()).await;
            let expected = versions[versions.len() - (n as usize).min(cap)..].to_vec();
            assert_eq!(held, expected, "cap={cap} n={n}");
            assert_eq!(log.len(&key()).await, (n as usize).min(cap));
        }
    }

    #[tokio::test]
    async fn versions_are_distinct_and_increasing() {
        let log = EventLog::new(1000);
        let versions = fill(&log, 200).await;
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn replay_after_latest_is_empty() {
        let log = EventLog::new(4);
        let versions = fill(&log, 6).await;
        let latest = *versions.last().unwrap();
        assert_eq!(log.latest(&key()).await, Some(latest));
        let replay = log.replay_after(&key(), &latest).await.unwrap();
        assert!(replay.is_empty());
    }

    #[tokio::test]
    async fn replay_after_returns_strict_suffix() {
        let log = EventLog::new(10);
        let versions = fill(&log, 5).await;
        let replay = log.replay_after(&key(), &versions[1]).await.unwrap();
        assert_eq!(payloads(&replay), vec![2, 3, 4]);
        let replayed: Vec<_> = replay.iter().filter_map(|e| e.resource_version()).collect();
        assert_eq!(replayed, versions[2..].to_vec());
    }

    #[tokio::test]
    async fn replay_after_survives_wraparound() {
        let log = EventLog::new(3);
        let versions = fill(&log, 8).await;
        // retained: 5, 6, 7
        let replay = log.replay_after(&key(), &versions[5]).await.unwrap();
        assert_eq!(payloads(&replay), vec![6, 7]);
    }

    #[tokio::test]
    async fn evicted_version_is_not_found() {
        let log = EventLog::new(3);
        let versions = fill(&log, 5).await;
        let err = log.replay_after(&key(), &versions[0]).await.unwrap_err();
        assert!(matches!(err, WatchError::VersionNotFound { .. }));
        let err = log.replay_after(&key(), &versions[1]).await.unwrap_err();
        assert!(matches!(err, WatchError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn foreign_version_is_not_found() {
        let a = EventLog::new(10);
        let b = EventLog::new(10);
        let va = fill(&a, 1).await;
        fill(&b, 3).await;
        let err = b.replay_after(&key(), &va[0]).await.unwrap_err();
        assert!(matches!(err, WatchError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn unknown_key_is_no_such_resource() {
        let log: EventLog<u32> = EventLog::new(10);
        let v = ResourceVersion::new(1, 1);
        let err = log.replay_after(&key(), &v).await.unwrap_err();
        assert!(matches!(err, WatchError::NoSuchResource { .. }));
        assert_eq!(log.len(&key()).await, 0);
        assert_eq!(log.latest(&key()).await, None);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let log = EventLog::new(2);
        let other = ResourceKey::new("core", "v1", "file", "default", "other");
        fill(&log, 5).await;
        let v = log.append(&other, Arc::new(Event::added(99))).await;
        assert_eq!(log.len(&key()).await, 2);
        assert_eq!(log.versions(&other).await, vec![v]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_and_replays_stay_consistent() {
        let log = Arc::new(EventLog::new(16));
        let writer = {
            let log = Arc::clone(&log);
            tokio::spawn(async move { fill(&log, 500).await })
        };
        let mut readers = Vec::new();
        for _ in 0..4 {
            let log = Arc::clone(&log);
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    if let Some(v) = log.latest(&key()).await {
                        // may have been evicted between the two calls; never wrong data
                        if let Ok(replay) = log.replay_after(&key(), &v).await {
                            let seqs: Vec<u64> = replay
                                .iter()
                                .filter_map(|e| e.resource_version())
                                .map(|rv| rv.seq())
                                .collect();
                            assert!(seqs.iter().all(|s| *s > v.seq()));
                            assert!(seqs.windows(2).all(|w| w[0] + 1 == w[1]));
                        }
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(log.len(&key()).await, 16);
    }

    #[tokio::test]
    async fn huge_capacity_does_not_reserve_up_front() {
        let log = EventLog::new(usize::MAX);
        let first = log.append(&key(), Arc::new(Event::added(1u32))).await;
        let second = log.append(&key(), Arc::new(Event::added(2u32))).await;
        assert_eq!(log.len(&key()).await, 2);
        assert_eq!(log.replay_after(&key(), &first).await.unwrap().len(), 1);
        assert_eq!(log.latest(&key()).await, Some(second));
    }
}
