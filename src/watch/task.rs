//! # Watch tasks and callbacks.
//!
//! A [`WatchTask`] is a periodic asynchronous condition check registered with the
//! [`NotificationWatcher`](crate::NotificationWatcher). Its [`WatchCallback`] is invoked
//! once per tick with a fresh [`CancellationToken`], and answers with a
//! [`WatchOutcome`](crate::WatchOutcome).
//!
//! [`WatchFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a fresh
//! future per attempt.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{WatchError, WatchFn, WatchOutcome, WatchTask, FAST_POLL_INTERVAL};
//!
//! let task = WatchTask::new(WatchFn::arc(|_ctx: CancellationToken| async {
//!     Ok::<_, WatchError>(WatchOutcome::Repoll)
//! }))
//! .with_name("deployment-ready")
//! .with_interval(FAST_POLL_INTERVAL);
//!
//! assert_eq!(task.name(), "deployment-ready");
//! assert_eq!(task.interval(), Some(Duration::from_secs(3)));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::watch::outcome::WatchOutcome;

/// Identifier assigned by the watcher on registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub(crate) u64);

impl WatchId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// Boxed future returned by one callback attempt.
pub type BoxWatchFuture = Pin<Box<dyn Future<Output = Result<WatchOutcome, WatchError>> + Send + 'static>>;

/// Shared handle to a callback object.
pub type WatchCallbackRef = Arc<dyn WatchCallback>;

/// # Periodic condition check.
///
/// Implementations should observe the token and return [`WatchError::Canceled`] promptly
/// once it is cancelled; the result of a cancelled attempt is ignored anyway.
pub trait WatchCallback: Send + Sync + 'static {
    /// Starts one attempt.
    fn check(&self, ctx: CancellationToken) -> BoxWatchFuture;
}

/// Function-backed callback implementation.
pub struct WatchFn<F> {
    f: F,
}

impl<F> WatchFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the callback and returns it as a shared handle.
    pub fn arc<Fut>(f: F) -> Arc<Self>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<WatchOutcome, WatchError>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> WatchCallback for WatchFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WatchOutcome, WatchError>> + Send + 'static,
{
    fn check(&self, ctx: CancellationToken) -> BoxWatchFuture {
        Box::pin((self.f)(ctx))
    }
}

/// Callback plus scheduling parameters.
#[derive(Clone)]
pub struct WatchTask {
    callback: WatchCallbackRef,
    interval: Option<Duration>,
    name: Cow<'static, str>,
}

impl WatchTask {
    /// Creates a task using the watcher's default interval.
    pub fn new(callback: WatchCallbackRef) -> Self {
        Self {
            callback,
            interval: None,
            name: Cow::Borrowed("watch"),
        }
    }

    /// Overrides the repoll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Label used in events and shutdown reports.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub(crate) fn callback(&self) -> &WatchCallbackRef {
        &self.callback
    }
}

impl fmt::Debug for WatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn callback_sees_its_token() {
        let cb = WatchFn::arc(|ctx: CancellationToken| async move {
            if ctx.is_cancelled() {
                return Err(WatchError::Canceled);
            }
            Ok(WatchOutcome::Stop)
        });

        assert!(matches!(cb.check(CancellationToken::new()).await, Ok(WatchOutcome::Stop)));
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(cb.check(token).await.err(), Some(WatchError::Canceled));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(WatchId(7).to_string(), "watch-7");
    }
}
