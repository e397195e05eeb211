//! Error types used by fetch engines, watchers and the session runtime.
//!
//! This module defines three error enums:
//!
//! - [`FetchError`]: outcomes of a single producer invocation that did not yield a value.
//! - [`WatchError`]: failures of watch callbacks and of the notification registry itself.
//! - [`RuntimeError`]: errors raised while tearing the session runtime down.
//!
//! All of them provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the session runtime.
///
/// These represent failures of the orchestration itself,
/// such as a teardown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Grace period was exceeded; some watch attempts were still in flight and had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Labels of the watches whose attempts did not settle in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fetchvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck watches={stuck:?}")
            }
        }
    }
}

/// # Errors produced by a producer invocation.
///
/// Only [`FetchError::Fail`] is a real failure that ends up in
/// [`FetchState::error`](crate::FetchState::error). The other variants describe
/// invocations that should stay invisible to the user.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Preconditions for fetching are not satisfied yet (e.g. no namespace selected).
    ///
    /// Never surfaced through `error`; keeps `loaded == false`.
    #[error("not ready: {reason}")]
    NotReady {
        /// What the producer is still waiting for.
        reason: String,
    },

    /// The producer failed; recorded in `error`, `loaded` becomes `true`.
    #[error("fetch failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The invocation observed its cancellation token and gave up.
    #[error("fetch cancelled")]
    Canceled,
}

impl FetchError {
    /// Shorthand for [`FetchError::NotReady`].
    pub fn not_ready(reason: impl Into<String>) -> Self {
        FetchError::NotReady {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`FetchError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        FetchError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fetchvisor::FetchError;
    ///
    /// assert_eq!(FetchError::not_ready("namespace").as_label(), "fetch_not_ready");
    /// assert_eq!(FetchError::fail("boom").as_label(), "fetch_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FetchError::NotReady { .. } => "fetch_not_ready",
            FetchError::Fail { .. } => "fetch_failed",
            FetchError::Canceled => "fetch_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            FetchError::NotReady { reason } => format!("not ready: {reason}"),
            FetchError::Fail { error } => format!("error: {error}"),
            FetchError::Canceled => "fetch cancelled".to_string(),
        }
    }

    /// True for the "still waiting" sentinel.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, FetchError::NotReady { .. })
    }

    /// True when the producer gave up because its token was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchError::Canceled)
    }
}

/// # Errors produced by watch callbacks and the notification registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// The callback failed; treated as an error outcome with this message.
    #[error("watch failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The callback observed its cancellation token and gave up.
    #[error("watch cancelled")]
    Canceled,

    /// The watcher registry has been torn down.
    #[error("notification watcher is closed")]
    Closed,

    /// No watch with this id is registered.
    #[error("watch {id} not found")]
    NotFound {
        /// The unknown watch id.
        id: u64,
    },
}

impl WatchError {
    /// Shorthand for [`WatchError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        WatchError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fetchvisor::WatchError;
    ///
    /// assert_eq!(WatchError::Closed.as_label(), "watch_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::Fail { .. } => "watch_failed",
            WatchError::Canceled => "watch_canceled",
            WatchError::Closed => "watch_closed",
            WatchError::NotFound { .. } => "watch_not_found",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WatchError::Fail { error } => error.clone(),
            WatchError::Canceled => "watch cancelled".to_string(),
            WatchError::Closed => "notification watcher is closed".to_string(),
            WatchError::NotFound { id } => format!("watch {id} not found"),
        }
    }
}
