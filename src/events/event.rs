//! # Runtime events emitted by fetch engines and the notification watcher.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Fetch events**: invocation flow of a [`FetchStateEngine`](crate::FetchStateEngine)
//! - **Watch events**: attempt flow and terminal states of watch tasks
//! - **Session events**: teardown of the session runtime
//! - **Subscriber events**: overflow/panic in subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, source
//! label, watch id, generation and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use fetchvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RepollScheduled)
//!     .with_source("deployment-ready")
//!     .with_watch(3)
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(3));
//!
//! assert_eq!(ev.kind, EventKind::RepollScheduled);
//! assert_eq!(ev.source.as_deref(), Some("deployment-ready"));
//! assert_eq!(ev.delay_ms, Some(3000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Session events ===
    /// Session teardown requested.
    ShutdownRequested,

    /// All watch attempts settled within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some attempts were aborted.
    GraceExceeded,

    // === Fetch events ===
    /// A producer invocation started.
    ///
    /// Sets:
    /// - `source`: engine name
    /// - `generation`: epoch captured by the invocation
    FetchStarting,

    /// The current invocation resolved with a value.
    ///
    /// Sets:
    /// - `source`: engine name
    /// - `generation`: epoch of the applied result
    FetchResolved,

    /// The current invocation failed; the error is now visible in the state.
    ///
    /// Sets:
    /// - `source`, `generation`
    /// - `reason`: failure message
    FetchFailed,

    /// The producer reported that its inputs are not ready yet.
    ///
    /// Sets:
    /// - `source`, `generation`
    /// - `reason`: what is missing
    FetchNotReady,

    /// Next poll armed after a settled invocation.
    ///
    /// Sets:
    /// - `source`
    /// - `delay_ms`: poll interval (ms)
    PollScheduled,

    /// Dependency identity changed; in-flight work is now stale.
    ///
    /// Sets:
    /// - `source`
    /// - `generation`: epoch after the bump
    FetchRebound,

    /// Engine disposed; no further invocations.
    FetchDisposed,

    // === Watch events ===
    /// Watch task added to the registry.
    ///
    /// Sets:
    /// - `source`: watch label
    /// - `watch`: watch id
    WatchRegistered,

    /// An attempt of a watch task started.
    ///
    /// Sets:
    /// - `source`, `watch`
    /// - `attempt`: attempt number (1-based, per task)
    AttemptStarting,

    /// The callback asked to be polled again.
    ///
    /// Sets:
    /// - `source`, `watch`, `attempt`
    /// - `delay_ms`: delay before the next attempt (ms)
    RepollScheduled,

    /// The callback resolved the watch without a notification.
    WatchStopped,

    /// The callback resolved the watch with a notification.
    ///
    /// Sets:
    /// - `source`, `watch`, `attempt`
    /// - `reason`: notification title
    NotificationRaised,

    /// The watch was cancelled by its owner or by teardown.
    WatchCancelled,

    /// The watch left the registry (after any terminal state).
    WatchRemoved,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Label of the engine or watch that emitted the event.
    pub source: Option<Arc<str>>,
    /// Watch id, for watch events.
    pub watch: Option<u64>,
    /// Fetch generation, for fetch events.
    pub generation: Option<u64>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt/poll in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, titles, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            watch: None,
            generation: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the label of the emitting engine/watch.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a watch id.
    #[inline]
    pub fn with_watch(mut self, id: u64) -> Self {
        self.watch = Some(id);
        self
    }

    /// Attaches a fetch generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::FetchStarting);
        let b = Event::new(EventKind::FetchResolved);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::PollScheduled).with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
