//! # fetchvisor
//!
//! **Fetchvisor** keeps asynchronously fetched state correct while its inputs change,
//! and runs background condition checks that end in a user-facing notification.
//!
//! It provides two primitives sharing one runtime core:
//! - [`FetchStateEngine`]: wraps a producer future, publishes its latest result as a
//!   [`FetchState`] and guarantees that a superseded invocation never overwrites newer state;
//! - [`NotificationWatcher`]: a registry of periodic watch callbacks that are repolled until
//!   they stop, succeed or fail, at which point a [`Notification`] is surfaced.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   observe(deps, producer)          register_notification(task)
//!            │                                  │
//!            ▼                                  ▼
//! ┌──────────────────────┐        ┌──────────────────────────┐
//! │  FetchStateEngine    │        │   NotificationWatcher    │
//! │  - AsyncResultCell   │        │   - Registry loop        │
//! │    (generation guard)│        │     (JoinSet + DelayQueue)│
//! │  - FetchDriver task  │        │   - Notify sink          │
//! └─────────┬────────────┘        └────────────┬─────────────┘
//!           │ publishes                        │ publishes
//!           │ - FetchStarting                  │ - AttemptStarting
//!           │ - FetchResolved / FetchFailed    │ - RepollScheduled
//!           │ - FetchNotReady / PollScheduled  │ - NotificationRaised
//!           ▼                                  ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                   Bus (broadcast channel)                     │
//! │                (capacity: Config::bus_capacity)               │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                ▼
//!                    Session subscriber_listener
//!                                ▼
//!                          SubscriberSet
//!                     ┌──────────┼──────────┐
//!                     ▼          ▼          ▼
//!                  worker1    worker2    workerN
//! ```
//!
//! ### Staleness
//! ```text
//! invocation A ── begin() → Epoch(1) ───────────────────────── resolve(1, "A") → Stale, dropped
//! deps change  ──────────── rebind() → Epoch(2)
//! invocation B ─────────────────────── begin() → Epoch(3) ── resolve(3, "B") → applied
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------------|
//! | **Fetch**         | Polled async values with staleness protection.                | [`FetchStateEngine`], [`FetchState`], [`Deps`]  |
//! | **Producers**     | Wrap closures returning futures.                              | [`Producer`], [`ProducerFn`]                    |
//! | **Watches**       | Periodic checks ending in notifications.                      | [`NotificationWatcher`], [`WatchTask`], [`WatchOutcome`] |
//! | **Notifications** | UI boundary for surfaced notices.                             | [`Notify`], [`ChannelNotifier`]                 |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom).          | [`Subscribe`]                                   |
//! | **Errors**        | Typed errors with stable labels.                              | [`FetchError`], [`WatchError`], [`RuntimeError`] |
//! | **Configuration** | Centralize session settings.                                  | [`Config`]                                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{
//!     Config, Deps, FetchError, ProducerFn, Session, WatchError, WatchFn, WatchOutcome, WatchTask,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn fetchvisor::Subscribe>> = vec![Arc::new(fetchvisor::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn fetchvisor::Subscribe>> = Vec::new();
//!
//!     let (session, mut notifications) = Session::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build_with_channel();
//!
//!     // A fetch that lists models of the selected project.
//!     let project = "demo".to_string();
//!     let models = session
//!         .fetch(
//!             ProducerFn::arc(move |_ctx: CancellationToken| {
//!                 let project = project.clone();
//!                 async move { Ok::<_, FetchError>(vec![format!("{project}/granite")]) }
//!             }),
//!             Vec::new(),
//!         )
//!         .deps(Deps::new().with("demo"))
//!         .poll_interval(Duration::from_secs(30))
//!         .build();
//!
//!     // A watch that reports once the deployment is ready.
//!     session.watcher().register_notification(
//!         WatchTask::new(WatchFn::arc(|_ctx: CancellationToken| async {
//!             Ok::<_, WatchError>(WatchOutcome::success("Deployment ready", "granite is serving"))
//!         }))
//!         .with_name("deployment"),
//!     )?;
//!
//!     let mut rx = models.subscribe();
//!     rx.wait_for(|s| s.loaded).await?;
//!     let note = notifications.recv().await.expect("notification");
//!     assert_eq!(note.title, "Deployment ready");
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod fetch;
mod stale;
mod subscribers;
mod watch;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_ERROR_TITLE, FAST_POLL_INTERVAL, POLL_INTERVAL};
pub use core::{Session, SessionBuilder};
pub use error::{FetchError, RuntimeError, WatchError};
pub use events::{Bus, Event, EventKind};
pub use fetch::{
    Applied, AsyncResultCell, BoxFetchFuture, DepKey, Deps, FetchBuilder, FetchOptions, FetchRefresh,
    FetchState, FetchStateEngine, Producer, ProducerFn, ProducerRef, Snapshot,
};
pub use stale::{Epoch, Generation};
pub use subscribers::{Subscribe, SubscriberSet};
pub use watch::{
    BoxWatchFuture, ChannelNotifier, LogNotifier, Notice, Notification, NotificationAction, NotificationWatcher,
    Notify, Severity, WatchCallback, WatchCallbackRef, WatchFn, WatchId, WatchInfo, WatchOutcome, WatchStatus,
    WatchTask,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
