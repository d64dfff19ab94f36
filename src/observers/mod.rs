//! # Observers: change sources behind a uniform contract.
//!
//! ```text
//!   FileObserver ──┐
//!   GitObserver  ──┼──► Observer::watch(ctx) ──► mpsc::Receiver<Event<Item>> ──► Dispatcher ingest
//!   custom       ──┘    Observer::list()     ──► Vec<Item> (snapshot for new subscribers)
//! ```
//!
//! Provided implementations poll; push-based sources (filesystem notifications,
//! webhooks) plug in behind the same trait without touching the dispatcher.

mod file;
mod git;
mod observer;
mod poll;

pub use file::{FileChange, FileObserver};
pub use git::{GitChange, GitObserver};
pub use observer::{Observer, ObserverRef};
pub use poll::PollConfig;
