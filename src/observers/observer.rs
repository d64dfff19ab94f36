//! # Observer: the source side of the dispatcher.
//!
//! The [`Observer`] trait is the **extension point** for change sources. The
//! dispatcher depends only on this contract; how changes are detected (polling,
//! filesystem notifications, webhooks) is up to the implementation.
//!
//! ## Contract
//! - `watch(ctx)` sets up the source and returns a bounded event stream. Setup
//!   failures are returned as [`ObserverError`]; any retrying happens **inside**
//!   `watch` before it returns.
//! - The stream must close once `ctx` is cancelled or the source is exhausted.
//!   The dispatcher never calls `watch` twice for one registration.
//! - `list()` returns a point-in-time snapshot; each item becomes an `Added` event
//!   for a subscriber that joins without a checkpoint.
//! - Neither call is made while the dispatcher holds a lock, so both may block
//!   for as long as the source needs.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//! use watchvisor::{Event, Observer, ObserverError};
//!
//! struct Static(Vec<String>);
//!
//! #[async_trait]
//! impl Observer for Static {
//!     type Item = String;
//!
//!     fn name(&self) -> &str { "static" }
//!
//!     async fn watch(&self, ctx: CancellationToken) -> Result<mpsc::Receiver<Event<String>>, ObserverError> {
//!         let (tx, rx) = mpsc::channel(1);
//!         // nothing ever changes: hold the stream open until cancelled
//!         tokio::spawn(async move {
//!             ctx.cancelled().await;
//!             drop(tx);
//!         });
//!         Ok(rx)
//!     }
//!
//!     async fn list(&self) -> Result<Vec<String>, ObserverError> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ObserverError;
use crate::events::Event;

/// Detects and reports changes to one resource.
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    /// Payload carried by this observer's events. Opaque to the dispatcher.
    type Item: Send + Sync + 'static;

    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Starts observing and returns the event stream.
    ///
    /// The stream closes when `ctx` is cancelled or the source is exhausted.
    async fn watch(
        &self,
        ctx: CancellationToken,
    ) -> Result<mpsc::Receiver<Event<Self::Item>>, ObserverError>;

    /// Returns the current state as a list of items.
    async fn list(&self) -> Result<Vec<Self::Item>, ObserverError>;
}

/// Shared handle to an observer producing payload `P`.
pub type ObserverRef<P> = Arc<dyn Observer<Item = P>>;
