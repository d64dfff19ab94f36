//! Runtime core: registration, ingest and lifecycle.
//!
//! The only public types from this module are [`Dispatcher`], its
//! [`DispatcherConfig`], and the [`IngestState`] it reports.
//!
//! Internal modules:
//! - [`registry`]: keys bound to observers, one ingest actor each;
//! - [`ingest`]: drives one observer stream into the log and out to subscribers;
//! - [`populate`]: snapshot/replay for a new subscription;
//! - [`shutdown`]: termination signal handling.

mod config;
mod dispatcher;
mod ingest;
mod populate;
mod registry;
mod shutdown;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use ingest::IngestState;
