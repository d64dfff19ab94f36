//! Timing policies used by observers.
//!
//! ## Contents
//! - [`RetryPolicy`] how an observer retries its own setup (attempts / first / factor / max + jitter)
//! - [`Jitter`] randomization for retry delays and poll ticks
//!
//! The dispatcher itself never retries: a closed or failed observer stream ends
//! ingestion for that key. Retrying is the observer's job, before `watch` returns.

mod jitter;
mod retry;

pub use jitter::Jitter;
pub use retry::RetryPolicy;
