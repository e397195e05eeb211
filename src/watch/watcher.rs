//! # NotificationWatcher: handle to a watch registry.
//!
//! The watcher is a cheap, cloneable handle. Registration is synchronous and returns the
//! new [`WatchId`] immediately; everything else is answered by the registry loop.
//!
//! ```text
//! register_notification(task) ──► id = next_id++ ──► Register ──► attempt 1 starts
//! unregister_notification(id) ──► Unregister ──► token cancelled, late result ignored
//! list / contains / status    ──► answered from the registry map
//! shutdown()                  ──► every task cancelled, wait up to Config::grace
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{
//!     Bus, ChannelNotifier, Config, NotificationWatcher, WatchError, WatchFn, WatchOutcome, WatchTask,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (notifier, mut notifications) = ChannelNotifier::new();
//!     let watcher = NotificationWatcher::new(Arc::new(notifier), Bus::new(64), &Config::default());
//!
//!     watcher
//!         .register_notification(WatchTask::new(WatchFn::arc(|_ctx: CancellationToken| async {
//!             Ok::<_, WatchError>(WatchOutcome::error("Deployment failed", "image pull backoff"))
//!         })))
//!         .unwrap();
//!
//!     let n = notifications.recv().await.unwrap();
//!     assert_eq!(n.title, "Deployment failed");
//!     watcher.shutdown().await.unwrap();
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{RuntimeError, WatchError};
use crate::events::Bus;
use crate::watch::notify::Notify;
use crate::watch::registry::{Registry, RegistryCommand, RegistryParams, WatchInfo};
use crate::watch::task::{WatchId, WatchTask};

/// Registers periodic condition checks and surfaces their terminal outcomes.
#[derive(Clone)]
pub struct NotificationWatcher {
    tx: mpsc::UnboundedSender<RegistryCommand>,
    next_id: Arc<AtomicU64>,
    lifetime: CancellationToken,
}

impl NotificationWatcher {
    /// Spawns a registry loop delivering notifications to `notifier`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(notifier: Arc<dyn Notify>, bus: Bus, cfg: &Config) -> Self {
        Self::with_lifetime(notifier, bus, cfg, CancellationToken::new())
    }

    /// Like [`new`](Self::new), but torn down when `lifetime` is cancelled.
    pub fn with_lifetime(notifier: Arc<dyn Notify>, bus: Bus, cfg: &Config, lifetime: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let params = RegistryParams {
            default_interval: cfg.default_poll_interval(),
            grace: cfg.grace,
            error_title: Arc::from(cfg.error_title.as_str()),
        };
        let registry = Registry::new(notifier, bus, lifetime.clone(), params);
        tokio::spawn(registry.run(rx));

        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
            lifetime,
        }
    }

    /// Adds `task` and starts its first attempt immediately.
    pub fn register_notification(&self, task: WatchTask) -> Result<WatchId, WatchError> {
        if self.lifetime.is_cancelled() {
            return Err(WatchError::Closed);
        }
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.tx
            .send(RegistryCommand::Register { id, task })
            .map_err(|_| WatchError::Closed)?;
        Ok(id)
    }

    /// Cancels the task; a result of its in-flight attempt is ignored.
    pub async fn unregister_notification(&self, id: WatchId) -> Result<(), WatchError> {
        self.request(|reply| RegistryCommand::Unregister { id, reply })
            .await?
    }

    /// All registered tasks, ordered by id.
    pub async fn list(&self) -> Vec<WatchInfo> {
        self.request(|reply| RegistryCommand::List { reply })
            .await
            .unwrap_or_default()
    }

    /// True while `id` is registered.
    pub async fn contains(&self, id: WatchId) -> bool {
        self.status(id).await.is_some()
    }

    /// Registry view of `id`, if registered.
    pub async fn status(&self, id: WatchId) -> Option<WatchInfo> {
        self.request(|reply| RegistryCommand::Status { id, reply })
            .await
            .ok()
            .flatten()
    }

    /// Cancels every task and waits up to [`Config::grace`] for in-flight attempts.
    ///
    /// Returns `Ok(())` when the watcher was already shut down.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|reply| RegistryCommand::Shutdown { reply })
            .await
            .unwrap_or(Ok(()))
    }

    /// True once the watcher has been torn down.
    pub fn is_closed(&self) -> bool {
        self.lifetime.is_cancelled() || self.tx.is_closed()
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> RegistryCommand,
    ) -> Result<R, WatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| WatchError::Closed)?;
        rx.await.map_err(|_| WatchError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::watch::notify::{ChannelNotifier, Notification, Severity};
    use crate::watch::outcome::WatchOutcome;
    use crate::watch::registry::WatchStatus;
    use crate::watch::task::WatchFn;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    fn watcher() -> (NotificationWatcher, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        (NotificationWatcher::new(Arc::new(notifier), Bus::new(256), &Config::default()), rx)
    }

    fn scripted(
        script: Vec<Result<WatchOutcome, WatchError>>,
        interval: Duration,
    ) -> (WatchTask, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let script = Arc::new(script);
        let cb = WatchFn::arc(move |_ctx: CancellationToken| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let script = Arc::clone(&script);
            async move { script.get(n).or(script.last()).cloned().unwrap_or(Ok(WatchOutcome::Stop)) }
        });
        (WatchTask::new(cb).with_interval(interval), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn tasks_are_independent() {
        let (w, mut notes) = watcher();
        let (forever, forever_calls) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::from_secs(1));
        let (once, once_calls) = scripted(vec![Ok(WatchOutcome::Stop)], Duration::from_secs(1));

        let a = w.register_notification(forever.with_name("forever")).expect("register");
        let b = w.register_notification(once.with_name("once")).expect("register");

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(forever_calls.load(Ordering::SeqCst), 4);
        assert_eq!(once_calls.load(Ordering::SeqCst), 1);
        assert!(w.contains(a).await);
        assert!(!w.contains(b).await);
        assert!(notes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_notifies_or_reschedules() {
        let (w, mut notes) = watcher();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let slow = WatchFn::arc(move |_ctx: CancellationToken| {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_millis(100)).await;
                Ok(WatchOutcome::error("late", "must not surface"))
            }
        });
        let id = w
            .register_notification(WatchTask::new(slow).with_interval(Duration::from_millis(10)))
            .expect("register");

        sleep(Duration::from_millis(10)).await;
        assert_eq!(w.status(id).await.map(|i| i.status), Some(WatchStatus::InFlight));
        w.unregister_notification(id).await.expect("unregister");

        sleep(Duration::from_secs(1)).await;
        assert!(notes.try_recv().is_err());
        assert!(!w.contains(id).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repoll_twice_then_error_raises_one_notification() {
        let (w, mut notes) = watcher();
        let (task, calls) = scripted(
            vec![
                Ok(WatchOutcome::Repoll),
                Ok(WatchOutcome::Repoll),
                Ok(WatchOutcome::error("X", "Y")),
            ],
            Duration::from_secs(1),
        );
        let id = w.register_notification(task).expect("register");

        sleep(Duration::from_millis(2500)).await;
        let n = notes.try_recv().expect("one notification");
        assert_eq!((n.id, n.severity), (id, Severity::Error));
        assert_eq!((n.title.as_str(), n.message.as_str()), ("X", "Y"));
        assert!(notes.try_recv().is_err());
        assert!(!w.contains(id).await);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(notes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callback_raises_error_with_default_title() {
        let (w, mut notes) = watcher();
        let (task, _calls) = scripted(vec![Err(WatchError::fail("pods unreachable"))], Duration::from_secs(1));
        w.register_notification(task).expect("register");

        sleep(Duration::from_millis(1)).await;
        let n = notes.try_recv().expect("notification");
        assert_eq!(n.severity, Severity::Error);
        assert_eq!(n.title, "Error");
        assert_eq!(n.message, "pods unreachable");
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_callback_is_isolated() {
        let (w, mut notes) = watcher();
        let boom = WatchFn::arc(|_ctx: CancellationToken| async {
            if true {
                panic!("callback exploded");
            }
            Ok(WatchOutcome::Stop)
        });
        let (healthy, healthy_calls) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::from_secs(1));

        let bad = w.register_notification(WatchTask::new(boom)).expect("register");
        let good = w.register_notification(healthy).expect("register");

        sleep(Duration::from_millis(1500)).await;
        let n = notes.try_recv().expect("notification");
        assert_eq!(n.id, bad);
        assert!(n.message.contains("callback exploded"));
        assert!(w.contains(good).await);
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_outcome_raises_success_notification() {
        let (w, mut notes) = watcher();
        let (task, _calls) = scripted(
            vec![Ok(WatchOutcome::Repoll), Ok(WatchOutcome::success("Fine-tune completed", "model ready"))],
            Duration::from_secs(3),
        );
        let id = w.register_notification(task).expect("register");

        sleep(Duration::from_millis(3100)).await;
        let n = notes.try_recv().expect("notification");
        assert_eq!(n.severity, Severity::Success);
        assert_eq!(n.title, "Fine-tune completed");
        assert!(!w.contains(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_callback_error_is_silent() {
        let (w, mut notes) = watcher();
        let (task, _calls) = scripted(vec![Err(WatchError::Canceled)], Duration::from_secs(1));
        let id = w.register_notification(task).expect("register");

        sleep(Duration::from_millis(10)).await;
        assert!(notes.try_recv().is_err());
        assert!(!w.contains(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn default_interval_comes_from_config() {
        let (notifier, _rx) = ChannelNotifier::new();
        let cfg = Config {
            poll_interval: Duration::from_secs(2),
            ..Config::default()
        };
        let w = NotificationWatcher::new(Arc::new(notifier), Bus::new(16), &cfg);
        let (task, calls) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::ZERO);
        w.register_notification(WatchTask::new(Arc::clone(task.callback())))
            .expect("register");

        sleep(Duration::from_millis(4500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn list_reports_tasks_in_id_order() {
        let (w, _notes) = watcher();
        let (a, _) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::from_secs(30));
        let (b, _) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::from_secs(30));
        let first = w.register_notification(a.with_name("deployment")).expect("register");
        let second = w.register_notification(b.with_name("fine-tune")).expect("register");

        sleep(Duration::from_millis(1)).await;
        let all = w.list().await;
        assert_eq!(all.iter().map(|i| i.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(all[0].name, "deployment");
        assert_eq!(all[0].status, WatchStatus::Scheduled);
        assert_eq!(all[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_unknown_id_is_not_found() {
        let (w, _notes) = watcher();
        assert_eq!(
            w.unregister_notification(WatchId(42)).await,
            Err(WatchError::NotFound { id: 42 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything_and_closes() {
        let bus = Bus::new(256);
        let mut events = bus.subscribe();
        let (notifier, mut notes) = ChannelNotifier::new();
        let w = NotificationWatcher::new(Arc::new(notifier), bus, &Config::default());
        let (task, calls) = scripted(vec![Ok(WatchOutcome::Repoll)], Duration::from_secs(1));
        let id = w.register_notification(task).expect("register");

        sleep(Duration::from_millis(1500)).await;
        w.shutdown().await.expect("within grace");
        assert!(w.is_closed());
        assert_eq!(w.register_notification(scripted(vec![], Duration::ZERO).0), Err(WatchError::Closed));
        assert!(!w.contains(id).await);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(notes.try_recv().is_err());

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert!(kinds.contains(&EventKind::AllStoppedWithin));
    }
}
