//! Watch events: data model and the versioned event log.
//!
//! ## Contents
//! - [`ResourceKey`] identity of a watchable resource
//! - [`EventKind`], [`Event`] what observers report
//! - [`ResourceVersion`], [`WatchEvent`] what consumers receive
//! - [`EventLog`] bounded per-key history with replay
//!
//! ## Quick reference
//! - **Writers**: the per-key ingest task and snapshot population, both through
//!   [`EventLog::append`].
//! - **Readers**: replay population through [`EventLog::replay_after`].

mod event;
mod key;
mod log;
mod version;

pub use event::{Event, EventKind, WatchEvent};
pub use key::{ParseKeyError, ResourceKey};
pub use log::EventLog;
pub use version::{ParseVersionError, ResourceVersion};
