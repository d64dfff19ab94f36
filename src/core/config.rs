//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`] centralized settings for a [`Dispatcher`](crate::Dispatcher).
//!
//! ## Sentinel values
//! - `log_capacity = 0`, `queue_capacity = 0` → clamped to 1
//! - `grace = 0s` → shutdown aborts ingest tasks without waiting

use std::time::Duration;

/// Configuration for one dispatcher instance.
///
/// ## Field semantics
/// - `log_capacity`: events retained per resource key (oldest evicted first)
/// - `queue_capacity`: per-subscription delivery queue size; overflow drops for that subscriber only
/// - `delivery_timeout`: how long a snapshot/replay item may wait for queue space before it is skipped
/// - `grace`: how long shutdown waits for ingest tasks to stop
///
/// All fields are public; prefer the accessors, which apply the clamps.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum number of events retained per resource key.
    ///
    /// Checkpoints older than the retained window fail with `VersionNotFound`.
    pub log_capacity: usize,

    /// Capacity of each subscription's delivery queue.
    ///
    /// Live events that find the queue full are dropped for that subscriber.
    pub queue_capacity: usize,

    /// Per-item offer timeout used while populating a new subscription
    /// (snapshot items or replayed history). A timed-out item is skipped.
    pub delivery_timeout: Duration,

    /// Maximum time to wait for ingest tasks to stop during shutdown.
    pub grace: Duration,
}

impl DispatcherConfig {
    /// Per-key log capacity, clamped to a minimum of 1.
    #[inline]
    pub fn log_capacity_clamped(&self) -> usize {
        self.log_capacity.max(1)
    }

    /// Queue capacity, clamped to a minimum of 1 (tokio channels reject 0).
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `log_capacity = 1000`
    /// - `queue_capacity = 100`
    /// - `delivery_timeout = 100ms`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            log_capacity: 1000,
            queue_capacity: 100,
            delivery_timeout: Duration::from_millis(100),
            grace: Duration::from_secs(5),
        }
    }
}
