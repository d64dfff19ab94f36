//! # Retry policy for observer setup.
//!
//! Observers own their restarts: the dispatcher never re-invokes `watch`.
//! [`RetryPolicy`] describes how an observer retries its own setup before
//! giving up and reporting [`ObserverError::Setup`](crate::ObserverError::Setup).
//!
//! Delay for retry `n` (0-based) is `first × factor^n`, capped at `max`, then jittered.
//! The base is derived from `n` alone, so jitter never feeds back into later delays.
//!
//! ```rust
//! use std::time::Duration;
//! use watchvisor::{Jitter, RetryPolicy};
//!
//! let retry = RetryPolicy {
//!     attempts: 4,
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: Jitter::None,
//! };
//! assert_eq!(retry.delay(0), Duration::from_millis(100));
//! assert_eq!(retry.delay(2), Duration::from_millis(400));
//! assert_eq!(retry.delay(9), Duration::from_secs(1));
//! ```

use std::time::Duration;

use super::jitter::Jitter;

/// How many times, and how far apart, an observer retries a failed setup.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first (`0` is treated as `1`).
    pub attempts: u32,
    /// Delay before the first retry.
    pub first: Duration,
    /// Delay cap.
    pub max: Duration,
    /// Growth factor per retry.
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    /// 3 attempts, 200ms doubling up to 5s, equal jitter.
    fn default() -> Self {
        Self {
            attempts: 3,
            first: Duration::from_millis(200),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: Jitter::Equal,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Total attempts, at least 1.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(factor: f64) -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor,
            jitter: Jitter::None,
        }
    }

    #[test]
    fn constant_factor_keeps_first() {
        let p = policy(1.0);
        for n in 0..8 {
            assert_eq!(p.delay(n), Duration::from_millis(100));
        }
    }

    #[test]
    fn first_above_max_is_capped() {
        let p = RetryPolicy {
            first: Duration::from_secs(30),
            ..policy(2.0)
        };
        assert_eq!(p.delay(0), Duration::from_secs(10));
    }

    #[test]
    fn overflow_is_capped() {
        assert_eq!(policy(2.0).delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_means_one() {
        let p = RetryPolicy {
            attempts: 0,
            ..policy(2.0)
        };
        assert_eq!(p.attempts(), 1);
        assert_eq!(RetryPolicy::once().attempts(), 1);
    }

    #[test]
    fn jittered_delay_stays_under_base() {
        let p = RetryPolicy {
            jitter: Jitter::Full,
            ..policy(2.0)
        };
        for n in 0..10 {
            let base = Duration::from_millis(100 * 2u64.pow(n)).min(Duration::from_secs(10));
            assert!(p.delay(n) <= base);
        }
    }
}
