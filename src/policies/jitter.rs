//! # Jitter for poll ticks and retry delays.
//!
//! Many observers created at the same moment with the same interval would otherwise
//! scan in lockstep. [`Jitter`] spreads them out.
//!
//! - [`Jitter::None`] exact delay
//! - [`Jitter::Full`] random in `[0, delay]`
//! - [`Jitter::Equal`] `delay/2 + random[0, delay/2]`

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Use the delay as is.
    #[default]
    None,
    /// Anywhere between zero and the delay.
    Full,
    /// At least half of the delay.
    Equal,
}

impl Jitter {
    /// Applies this jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if ms == 0 {
            return delay;
        }
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            Jitter::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
            }
        }
    }
}
