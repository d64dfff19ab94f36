//! # Change events and the delivery envelope.
//!
//! [`Event`] is what an observer reports: a [`EventKind`], an opaque payload and a timestamp.
//! [`WatchEvent`] is what a consumer receives: the stored event plus the
//! [`ResourceVersion`] the log assigned to it.
//!
//! The payload type `P` is never inspected by the engine. Events are shared as
//! `Arc<Event<P>>` between the log and every subscription, so `P` does not need `Clone`.
//!
//! ## Example
//! ```rust
//! use watchvisor::{Event, EventKind};
//!
//! let ev = Event::modified("config.toml");
//! assert_eq!(ev.kind, EventKind::Modified);
//! assert_eq!(ev.payload, Some("config.toml"));
//!
//! let err = Event::<&str>::error("scan failed");
//! assert!(err.payload.is_none());
//! assert_eq!(err.reason.as_deref(), Some("scan failed"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::version::ResourceVersion;

/// Classification of change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Resource (or item) appeared. Also used for snapshot items.
    Added,
    /// Resource (or item) changed.
    Modified,
    /// Resource (or item) disappeared.
    Deleted,
    /// Something went wrong; `reason` carries the message.
    ///
    /// On a subscription this is informational-terminal for freshness: the
    /// consumer should drop its checkpoint and re-subscribe from a snapshot.
    Error,
}

impl EventKind {
    /// Wire name (`ADDED`, `MODIFIED`, `DELETED`, `ERROR`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Added => "ADDED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
            EventKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change event with an opaque payload.
///
/// - `payload` is `None` only for [`EventKind::Error`]
/// - `reason` is set for errors (and may annotate other kinds)
/// - `at` is the wall-clock time of observation
#[derive(Debug, Clone)]
pub struct Event<P> {
    /// Event classification.
    pub kind: EventKind,
    /// Observed item, untouched by the engine.
    pub payload: Option<P>,
    /// Human-readable reason (errors, annotations).
    pub reason: Option<Arc<str>>,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

impl<P> Event<P> {
    /// Creates an event of `kind` carrying `payload`, stamped now.
    pub fn new(kind: EventKind, payload: P) -> Self {
        Self {
            kind,
            payload: Some(payload),
            reason: None,
            at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn added(payload: P) -> Self {
        Self::new(EventKind::Added, payload)
    }

    #[inline]
    pub fn modified(payload: P) -> Self {
        Self::new(EventKind::Modified, payload)
    }

    #[inline]
    pub fn deleted(payload: P) -> Self {
        Self::new(EventKind::Deleted, payload)
    }

    /// Creates a payload-less error event.
    pub fn error(reason: impl Into<Arc<str>>) -> Self {
        Self {
            kind: EventKind::Error,
            payload: None,
            reason: Some(reason.into()),
            at: SystemTime::now(),
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Overrides the timestamp.
    #[inline]
    pub fn with_at(mut self, at: SystemTime) -> Self {
        self.at = at;
        self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error)
    }
}

/// Delivery envelope: `{type, payload, timestamp, resourceVersion}`.
///
/// The version rides next to the event instead of inside the payload.
/// `resource_version` is `None` only for error events synthesised while populating
/// a subscription (those are never logged).
pub struct WatchEvent<P> {
    event: Arc<Event<P>>,
    resource_version: Option<ResourceVersion>,
}

impl<P> WatchEvent<P> {
    pub(crate) fn versioned(event: Arc<Event<P>>, version: ResourceVersion) -> Self {
        Self {
            event,
            resource_version: Some(version),
        }
    }

    pub(crate) fn unversioned(event: Event<P>) -> Self {
        Self {
            event: Arc::new(event),
            resource_version: None,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind
    }

    pub fn payload(&self) -> Option<&P> {
        self.event.payload.as_ref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.event.reason.as_deref()
    }

    pub fn at(&self) -> SystemTime {
        self.event.at
    }

    pub fn resource_version(&self) -> Option<ResourceVersion> {
        self.resource_version
    }

    /// The shared event as stored in the log.
    pub fn event(&self) -> &Arc<Event<P>> {
        &self.event
    }
}

impl<P> Clone for WatchEvent<P> {
    fn clone(&self) -> Self {
        Self {
            event: Arc::clone(&self.event),
            resource_version: self.resource_version,
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for WatchEvent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchEvent")
            .field("kind", &self.event.kind)
            .field("payload", &self.event.payload)
            .field("reason", &self.event.reason)
            .field("resource_version", &self.resource_version)
            .finish()
    }
}
