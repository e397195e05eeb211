//! # Session-wide configuration.
//!
//! Provides [`Config`] centralized settings for a [`Session`](crate::Session)
//! and the module-wide polling constants.
//!
//! Config is used in two ways:
//! 1. **Session creation**: `Session::builder(config)`
//! 2. **Defaults**: watch tasks without an explicit interval use [`Config::poll_interval`],
//!    fetch engines built through [`Session::fetch`](crate::Session::fetch) share the session bus.
//!
//! ## Sentinel values
//! - `grace = 0s` → teardown does not wait for in-flight attempts, they are aborted immediately
//! - `poll_interval = 0s` → falls back to [`POLL_INTERVAL`]

use std::time::Duration;

/// Default interval between two polls of a watch task or a polling fetch.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Interval for conditions expected to resolve quickly (e.g. "has the deployment started").
pub const FAST_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Title of the notification raised when a watch callback fails instead of returning an outcome.
pub const DEFAULT_ERROR_TITLE: &str = "Error";

/// Global configuration for a session.
///
/// ## Field semantics
/// - `grace`: Maximum wait for in-flight watch attempts on teardown (`0s` = abort immediately)
/// - `poll_interval`: Default repoll interval for watch tasks (`0s` = [`POLL_INTERVAL`])
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `error_title`: Notification title used when a callback fails without an outcome
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for in-flight watch attempts when the session is torn down.
    pub grace: Duration,

    /// Interval used by watch tasks that do not specify their own.
    pub poll_interval: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Title of notifications raised for failed callbacks.
    pub error_title: String,
}

impl Config {
    /// Returns the effective default poll interval.
    #[inline]
    pub fn default_poll_interval(&self) -> Duration {
        if self.poll_interval == Duration::ZERO {
            POLL_INTERVAL
        } else {
            self.poll_interval
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `poll_interval = POLL_INTERVAL` (30s)
    /// - `bus_capacity = 1024`
    /// - `error_title = "Error"`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            poll_interval: POLL_INTERVAL,
            bus_capacity: 1024,
            error_title: DEFAULT_ERROR_TITLE.to_string(),
        }
    }
}
