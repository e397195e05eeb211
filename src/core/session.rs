//! # Session: the context-scoped owner of the runtime pieces.
//!
//! A [`Session`] bundles what one UI context shares: the [`Config`], the event [`Bus`],
//! a [`SubscriberSet`] fed by a bus listener, and one [`NotificationWatcher`]. Fetch
//! engines are created through [`Session::fetch`] so that they publish on the session bus.
//!
//! ## High-level architecture
//! ```text
//! SessionBuilder::build()
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SubscriberSet::new(subscribers, bus)
//!   ├─► subscriber_listener(set): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   └─► NotificationWatcher::with_lifetime(notifier, bus, cfg, runtime_token.child_token())
//!
//! Event flow:
//!   FetchDriver ─┐
//!   Registry ────┼─ publish(Event) ──► Bus ──► listener ──► SubscriberSet ──► [queue S1..SN]
//!   Session ─────┘
//!
//! Shutdown path:
//!   Session::shutdown()
//!     └─► NotificationWatcher::shutdown()   (cancel tasks, wait up to cfg.grace)
//!     └─► runtime_token.cancel()            (listener forwards what is left, then exits)
//!     └─► SubscriberSet::shutdown()         (workers drain their queues, awaited via the listener)
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{Config, FetchError, ProducerFn, Session};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (session, _notifications) = Session::builder(Config::default()).build_with_channel();
//!
//!     let engine = session
//!         .fetch(
//!             ProducerFn::arc(|_ctx: CancellationToken| async { Ok::<_, FetchError>(42_u32) }),
//!             0,
//!         )
//!         .name("answer")
//!         .poll_interval(Duration::from_secs(30))
//!         .build();
//!
//!     let mut rx = engine.subscribe();
//!     rx.wait_for(|s| s.loaded).await?;
//!     assert_eq!(engine.snapshot().data, 42);
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::fetch::{FetchBuilder, ProducerRef};
use crate::subscribers::SubscriberSet;
use crate::watch::NotificationWatcher;

use super::builder::SessionBuilder;

/// Owns configuration, event delivery and the notification watcher of one context.
pub struct Session {
    /// Session configuration.
    pub cfg: Config,
    /// Event bus shared by every engine and the watcher.
    pub bus: Bus,
    subscriber_count: usize,
    listener: Mutex<Option<JoinHandle<()>>>,
    watcher: NotificationWatcher,
    runtime_token: CancellationToken,
}

impl Session {
    /// Starts a builder with the given configuration.
    pub fn builder(cfg: Config) -> SessionBuilder {
        SessionBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        watcher: NotificationWatcher,
        runtime_token: CancellationToken,
    ) -> Self {
        let subscriber_count = subs.len();
        let listener = subscriber_listener(&bus, subs, runtime_token.clone());
        Self {
            cfg,
            bus,
            subscriber_count,
            listener: Mutex::new(Some(listener)),
            watcher,
            runtime_token,
        }
    }

    /// The session-wide notification watcher.
    pub fn watcher(&self) -> &NotificationWatcher {
        &self.watcher
    }

    /// Builder for a fetch engine publishing on the session bus.
    ///
    /// The engine keeps running independently of the session; dispose or drop it
    /// with the component that owns it.
    pub fn fetch<T>(&self, producer: ProducerRef<T>, initial: T) -> FetchBuilder<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        FetchBuilder::new(producer, initial).bus(self.bus.clone())
    }

    /// Number of event subscribers attached to the session.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    /// Tears the session down: cancels every watch task (waiting up to [`Config::grace`]),
    /// stops event delivery and drains subscriber queues.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let res = self.watcher.shutdown().await;
        self.runtime_token.cancel();

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            if let Err(e) = handle.await {
                tracing::warn!(event = "session.listener_failed", error = %e);
            }
        }
        res
    }
}

/// Subscribes to the bus and forwards events to the subscriber set until `token` is cancelled.
///
/// Events already queued at cancellation are still delivered, then the set is shut down.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(event = "session.listener_lagged", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
        set.shutdown().await;
    })
}

impl Drop for Session {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, WatchError};
    use crate::events::{Event, EventKind};
    use crate::fetch::ProducerFn;
    use crate::subscribers::Subscribe;
    use crate::watch::{Severity, WatchFn, WatchOutcome, WatchTask};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, e: &Event) {
            self.kinds.lock().unwrap().push(e.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn engines_and_watches_publish_to_session_subscribers() {
        let rec = Arc::new(Recorder::default());
        let (session, mut notes) = Session::builder(Config::default())
            .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
            .build_with_channel();
        assert_eq!(session.subscriber_count(), 1);

        let engine = session
            .fetch(
                ProducerFn::arc(|_ctx: CancellationToken| async { Ok::<_, FetchError>(1_u32) }),
                0,
            )
            .name("answer")
            .build();
        session
            .watcher()
            .register_notification(WatchTask::new(WatchFn::arc(|_ctx: CancellationToken| async {
                Ok::<_, WatchError>(WatchOutcome::success("Done", "ready"))
            })))
            .expect("register");

        sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.snapshot().data, 1);
        assert_eq!(notes.recv().await.map(|n| n.severity), Some(Severity::Success));

        session.shutdown().await.expect("shutdown");

        let kinds = rec.kinds.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::FetchResolved));
        assert!(kinds.contains(&EventKind::NotificationRaised));
        assert!(kinds.contains(&EventKind::ShutdownRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_idempotent() {
        let session = Session::builder(Config::default()).build();
        session.shutdown().await.expect("first");
        session.shutdown().await.expect("second");
        assert!(session.watcher().is_closed());
    }
}
