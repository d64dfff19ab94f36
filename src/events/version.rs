//! # Resource versions.
//!
//! A [`ResourceVersion`] marks one entry's position in a key's event log.
//! Consumers should treat it as opaque: store the last one they saw and hand it back
//! to [`Dispatcher::subscribe`](crate::Dispatcher::subscribe) to resume.
//!
//! ## Rules
//! - `seq` is assigned by a per-log counter under the log lock, never by the clock,
//!   so two appends in the same nanosecond still get distinct versions.
//! - `epoch` is random per log instance; a checkpoint from another dispatcher
//!   (or a previous process) never aliases a live entry.
//! - Within one log, versions order like the entries they mark.
//!
//! Text form: `<epoch as 16 hex digits>-<seq>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Opaque, log-unique, monotonically assigned position token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceVersion {
    epoch: u64,
    seq: u64,
}

impl ResourceVersion {
    pub(crate) fn new(epoch: u64, seq: u64) -> Self {
        Self { epoch, seq }
    }

    /// Position counter within the issuing log (starts at 1).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{}", self.epoch, self.seq)
    }
}

/// A checkpoint string is not a resource version this crate issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed resource version {0:?}")]
pub struct ParseVersionError(pub(crate) String);

impl FromStr for ResourceVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ParseVersionError(s.to_string());
        let (epoch, seq) = s.split_once('-').ok_or_else(bad)?;
        let epoch = u64::from_str_radix(epoch, 16).map_err(|_| bad())?;
        let seq = seq.parse::<u64>().map_err(|_| bad())?;
        Ok(Self { epoch, seq })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_parses_back() {
        let v = ResourceVersion::new(0xdead_beef, 42);
        assert_eq!(v.to_string(), "00000000deadbeef-42");
        assert_eq!(v.to_string().parse::<ResourceVersion>().unwrap(), v);
    }

    #[test]
    fn garbage_is_rejected() {
        for s in ["", "12", "zz-1", "00-", "-1", "00-x"] {
            assert!(s.parse::<ResourceVersion>().is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn same_epoch_orders_by_seq() {
        assert!(ResourceVersion::new(7, 1) < ResourceVersion::new(7, 2));
    }
}
