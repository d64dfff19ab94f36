//! # Subscriptions and per-key fan-out.
//!
//! ## Architecture
//! ```text
//! ingest task ── append ──► EventLog ── version ──► SubscriberSet::emit(&WatchEvent)
//!                                                         │  try_send, drop on full
//!                                        ┌────────────────┼────────────────┐
//!                                        ▼                ▼                ▼
//!                                   [queue S1]       [queue S2]       [queue SN]
//!                                        ▼                ▼                ▼
//!                                  Subscription     Subscription     Subscription
//! ```
//!
//! ## Rules
//! - A slow consumer only affects its own queue.
//! - Queue overflow drops the live event **for that subscription only**.
//! - Events are delivered FIFO per subscription.
//! - Consumers never block the ingest task or each other.

mod set;
mod subscription;

pub(crate) use set::{Feeder, Offer, SubscriberSet};
pub use subscription::{Subscription, SubscriptionHandle};
