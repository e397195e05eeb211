//! # LogWriter: tracing-backed event writer
//!
//! A minimal subscriber that forwards incoming [`Event`]s to [`tracing`].
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! DEBUG fetchvisor: fetch.starting source="models" generation=3
//! WARN  fetchvisor: fetch.failed source="models" generation=3 reason="fetch failed: 503"
//! DEBUG fetchvisor: watch.repoll source="deployment" watch=1 attempt=2 delay_ms=3000
//! INFO  fetchvisor: watch.notification source="deployment" watch=1 title="Deployment failed"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ShutdownRequested => tracing::info!(event = "session.shutdown_requested"),
            EventKind::AllStoppedWithin => tracing::info!(event = "session.stopped_within_grace"),
            EventKind::GraceExceeded => tracing::warn!(event = "session.grace_exceeded"),
            EventKind::FetchStarting => {
                tracing::debug!(event = "fetch.starting", source, generation = ?e.generation)
            }
            EventKind::FetchResolved => {
                tracing::debug!(event = "fetch.resolved", source, generation = ?e.generation)
            }
            EventKind::FetchFailed => {
                tracing::warn!(event = "fetch.failed", source, generation = ?e.generation, reason)
            }
            EventKind::FetchNotReady => {
                tracing::debug!(event = "fetch.not_ready", source, reason)
            }
            EventKind::PollScheduled => {
                tracing::trace!(event = "fetch.poll_scheduled", source, delay_ms = ?e.delay_ms)
            }
            EventKind::FetchRebound => {
                tracing::debug!(event = "fetch.rebound", source, generation = ?e.generation)
            }
            EventKind::FetchDisposed => tracing::debug!(event = "fetch.disposed", source),
            EventKind::WatchRegistered => {
                tracing::debug!(event = "watch.registered", source, watch = ?e.watch)
            }
            EventKind::AttemptStarting => {
                tracing::trace!(event = "watch.attempt", source, watch = ?e.watch, attempt = ?e.attempt)
            }
            EventKind::RepollScheduled => tracing::debug!(
                event = "watch.repoll",
                source,
                watch = ?e.watch,
                attempt = ?e.attempt,
                delay_ms = ?e.delay_ms
            ),
            EventKind::WatchStopped => {
                tracing::debug!(event = "watch.stopped", source, watch = ?e.watch)
            }
            EventKind::NotificationRaised => {
                tracing::info!(event = "watch.notification", source, watch = ?e.watch, title = reason)
            }
            EventKind::WatchCancelled => {
                tracing::debug!(event = "watch.cancelled", source, watch = ?e.watch)
            }
            EventKind::WatchRemoved => {
                tracing::trace!(event = "watch.removed", source, watch = ?e.watch)
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(event = "subscriber.overflow", subscriber = source, reason)
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(event = "subscriber.panicked", subscriber = source, reason)
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
