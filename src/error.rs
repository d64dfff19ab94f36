//! Error types used by the watchvisor dispatcher and observers.
//!
//! This module defines three error enums:
//!
//! - [`WatchError`]: errors returned synchronously by [`Dispatcher`](crate::Dispatcher) calls
//!   and by [`EventLog::replay_after`](crate::EventLog::replay_after).
//! - [`ObserverError`]: failures of an [`Observer`](crate::Observer)'s `watch`/`list`.
//! - [`RuntimeError`]: failures of the dispatcher lifecycle itself (shutdown).
//!
//! All of them provide `as_label` (stable snake_case label for logs/metrics) and `as_message`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::events::ResourceKey;

/// # Errors produced by dispatcher and event-log operations.
///
/// `AlreadyRegistered` and `NoSuchResource` are returned to the caller of
/// `register`/`subscribe`. `VersionNotFound` means the checkpoint is older than the
/// log retention (or never existed): the caller has to re-sync from a snapshot.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchError {
    /// An observer is already bound to this key; the registration was rejected.
    #[error("observer already registered for {key}")]
    AlreadyRegistered {
        /// Key of the rejected registration.
        key: ResourceKey,
    },

    /// No observer (or no log yet) exists for this key.
    #[error("no such resource {key}")]
    NoSuchResource {
        /// Key that was looked up.
        key: ResourceKey,
    },

    /// The checkpoint is not (or no longer) present in the key's log.
    #[error("resource version {version} not found for {key}")]
    VersionNotFound {
        /// Key whose log was searched.
        key: ResourceKey,
        /// The checkpoint as supplied by the caller.
        version: String,
    },

    /// An observer failed while serving a dispatcher call.
    #[error(transparent)]
    Observer(#[from] ObserverError),

    /// The dispatcher has been shut down and accepts no new work.
    #[error("dispatcher is stopped")]
    Stopped,
}

impl WatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use watchvisor::{ResourceKey, WatchError};
    ///
    /// let key = ResourceKey::new("core", "v1", "file", "default", "tmp");
    /// let err = WatchError::NoSuchResource { key };
    /// assert_eq!(err.as_label(), "watch_no_such_resource");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::AlreadyRegistered { .. } => "watch_already_registered",
            WatchError::NoSuchResource { .. } => "watch_no_such_resource",
            WatchError::VersionNotFound { .. } => "watch_version_not_found",
            WatchError::Observer(e) => e.as_label(),
            WatchError::Stopped => "watch_stopped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WatchError::AlreadyRegistered { key } => format!("already registered: {key}"),
            WatchError::NoSuchResource { key } => format!("no such resource: {key}"),
            WatchError::VersionNotFound { key, version } => {
                format!("history lost for {key} after version {version}; re-sync from snapshot")
            }
            WatchError::Observer(e) => e.as_message(),
            WatchError::Stopped => "dispatcher stopped".to_string(),
        }
    }

    /// True when the consumer must drop its checkpoint and re-subscribe from a snapshot.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            WatchError::VersionNotFound { .. } | WatchError::NoSuchResource { .. }
        )
    }
}

/// # Errors produced by resource observers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ObserverError {
    /// `watch` could not start its event stream.
    #[error("observer '{observer}' failed to start: {error}")]
    Setup {
        /// Observer name.
        observer: String,
        /// Underlying failure.
        error: String,
    },

    /// `list` could not produce a snapshot.
    #[error("observer '{observer}' failed to list: {error}")]
    List {
        /// Observer name.
        observer: String,
        /// Underlying failure.
        error: String,
    },

    /// Filesystem access failed.
    #[error("io error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: io::Error,
    },

    /// A git operation failed.
    #[error("git error: {error}")]
    Git {
        /// Underlying failure (tool output or library error).
        error: String,
    },
}

impl ObserverError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ObserverError::Setup { .. } => "observer_setup",
            ObserverError::List { .. } => "observer_list",
            ObserverError::Io { .. } => "observer_io",
            ObserverError::Git { .. } => "observer_git",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// Indicates whether an observer may retry the failed operation internally.
    ///
    /// Returns `true` for [`ObserverError::Io`] and [`ObserverError::Git`];
    /// `Setup`/`List` are already the final word of an observer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ObserverError::Io { .. } | ObserverError::Git { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ObserverError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn git(error: impl ToString) -> Self {
        ObserverError::Git {
            error: error.to_string(),
        }
    }
}

/// # Errors produced by the dispatcher lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the listed ingest tasks were aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Keys whose ingest task did not stop in time.
        stuck: Vec<ResourceKey>,
    },

    /// Termination signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use watchvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                let stuck: Vec<String> = stuck.iter().map(ToString::to_string).collect();
                format!("grace exceeded after {grace:?}; stuck ingest={stuck:?}")
            }
            RuntimeError::Signal(e) => format!("signal setup: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resync_is_required_only_for_lost_history() {
        let key = ResourceKey::new("core", "v1", "file", "default", "a");
        assert!(
            WatchError::VersionNotFound {
                key: key.clone(),
                version: "x".into()
            }
            .requires_resync()
        );
        assert!(WatchError::NoSuchResource { key: key.clone() }.requires_resync());
        assert!(!WatchError::AlreadyRegistered { key }.requires_resync());
        assert!(!WatchError::Stopped.requires_resync());
    }

    #[test]
    fn observer_errors_keep_their_label_through_watch_error() {
        let err: WatchError = ObserverError::git("fetch failed").into();
        assert_eq!(err.as_label(), "observer_git");
        assert!(err.as_message().contains("fetch failed"));
    }

    #[test]
    fn only_io_and_git_failures_are_retryable() {
        let io = ObserverError::io("/tmp/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(io.is_retryable());
        assert!(ObserverError::git("boom").is_retryable());
        let setup = ObserverError::Setup {
            observer: "file".into(),
            error: "boom".into(),
        };
        assert!(!setup.is_retryable());
    }
}
