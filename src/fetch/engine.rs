//! # FetchStateEngine: a polled asynchronous value with staleness protection.
//!
//! The engine wraps a [`Producer`](crate::Producer) and exposes its latest result as a
//! [`FetchState`]. It is the owner-side handle: UI code calls [`FetchStateEngine::observe`]
//! on every re-render with the current dependency list, and reads or subscribes to the
//! published state.
//!
//! ```text
//! observe(deps, make_producer)
//!   ├─ deps unchanged ──► same FetchRefresh, factory not called
//!   └─ deps changed   ──► cell.rebind()  (generation bump, loaded/error reset)
//!                         install producer, mint new FetchRefresh
//!                         Command::Rebind ──► driver supersedes in-flight work
//!
//! driver (one task per engine, see `fetch::driver`)
//!   invoke ──► resolve(epoch) ──► watch::Sender<Snapshot> ──► subscribe()/state()
//!                    └─ settled ──► poll timer (poll_interval > 0)
//!
//! dispose()/Drop ──► lifetime token cancelled ──► generation bumped one last time
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use fetchvisor::{Deps, FetchError, FetchStateEngine, ProducerFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let namespace = Some("team-a".to_string());
//!     let producer = ProducerFn::arc(move |_ctx: CancellationToken| {
//!         let namespace = namespace.clone();
//!         async move {
//!             namespace
//!                 .map(|ns| vec![format!("{ns}/granite")])
//!                 .ok_or_else(|| FetchError::not_ready("namespace"))
//!         }
//!     });
//!
//!     let engine = FetchStateEngine::builder(producer, Vec::new())
//!         .deps(Deps::new().with("team-a"))
//!         .poll_interval(Duration::from_secs(30))
//!         .build();
//!
//!     let mut rx = engine.subscribe();
//!     let snap = rx.wait_for(|s| s.loaded).await.unwrap().clone();
//!     assert_eq!(snap.data, vec!["team-a/granite".to_string()]);
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::fetch::cell::{AsyncResultCell, Snapshot};
use crate::fetch::deps::Deps;
use crate::fetch::driver::{Binding, Command, DriverParams, FetchDriver, Shared};
use crate::fetch::producer::ProducerRef;
use crate::fetch::state::{FetchRefresh, FetchState};

/// Knobs of a [`FetchStateEngine`].
///
/// ## Field semantics
/// - `poll_interval`: delay between a settled invocation and the next one (`0s` = no polling)
/// - `initial_promise_purity`: producers failing before their first suspension count as not ready
///   while nothing has loaded yet
/// - `reset_on_change`: a dependency change also resets `data` to the initial value
/// - `name`: label attached to events
/// - `bus`: where lifecycle events go (`None` = not published)
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub poll_interval: Duration,
    pub initial_promise_purity: bool,
    pub reset_on_change: bool,
    pub name: Option<String>,
    pub bus: Option<Bus>,
}

impl FetchOptions {
    fn driver_params(&self) -> DriverParams {
        DriverParams {
            poll_interval: (!self.poll_interval.is_zero()).then_some(self.poll_interval),
            initial_promise_purity: self.initial_promise_purity,
        }
    }
}

/// Polled asynchronous value guarded against stale results.
///
/// Dropping the engine disposes it.
pub struct FetchStateEngine<T> {
    shared: Arc<Shared<T>>,
    tx: mpsc::UnboundedSender<Command<T>>,
    lifetime: CancellationToken,
    initial: Option<T>,
}

impl<T> FetchStateEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates the engine and schedules the first invocation immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize(producer: ProducerRef<T>, deps: Deps, initial: T, options: FetchOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(options.name.as_deref().unwrap_or("fetch"));

        let shared = Arc::new(Shared {
            cell: AsyncResultCell::new(initial.clone()),
            binding: Mutex::new(Binding {
                deps,
                producer,
                refresh: FetchRefresh::new(tx.clone()),
            }),
            name,
            bus: options.bus.clone(),
        });

        let lifetime = CancellationToken::new();
        let driver = FetchDriver::new(
            Arc::clone(&shared),
            rx,
            lifetime.clone(),
            options.driver_params(),
        );
        tokio::spawn(driver.run());

        Self {
            shared,
            tx,
            lifetime,
            initial: options.reset_on_change.then_some(initial),
        }
    }

    /// Starts a builder with default options.
    pub fn builder(producer: ProducerRef<T>, initial: T) -> FetchBuilder<T> {
        FetchBuilder::new(producer, initial)
    }

    /// Re-render entry point: reconciles the dependency identity and returns the state.
    ///
    /// `make_producer` is only called when `deps` differ from the current identity, and
    /// never after [`dispose`](Self::dispose). It runs without any engine lock held.
    pub fn observe<F>(&self, deps: Deps, make_producer: F) -> FetchState<T>
    where
        F: FnOnce() -> ProducerRef<T>,
    {
        if self.is_disposed() {
            return self.state();
        }
        {
            let binding = self.shared.binding();
            if binding.deps == deps {
                return FetchState::from_snapshot(self.shared.cell.snapshot(), binding.refresh.clone());
            }
        }

        let producer = make_producer();
        let mut binding = self.shared.binding();
        if binding.deps != deps && !self.is_disposed() {
            binding.deps = deps;
            binding.producer = producer;
            binding.refresh = FetchRefresh::new(self.tx.clone());

            let epoch = self.shared.cell.rebind(self.initial.clone());
            self.shared
                .publish(Event::new(EventKind::FetchRebound).with_generation(epoch.get()));
            let _ = self.tx.send(Command::Rebind);
        }
        FetchState::from_snapshot(self.shared.cell.snapshot(), binding.refresh.clone())
    }

    /// Current state without reconciling dependencies.
    pub fn state(&self) -> FetchState<T> {
        let refresh = self.refresh();
        FetchState::from_snapshot(self.shared.cell.snapshot(), refresh)
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.shared.cell.snapshot()
    }

    /// Refresh handle for the current dependency identity.
    pub fn refresh(&self) -> FetchRefresh<T> {
        self.shared.binding().refresh.clone()
    }

    /// Receiver notified on every applied change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.shared.cell.subscribe()
    }

    /// Waits for the next applied change and returns the resulting state.
    ///
    /// Returns `None` once the engine is disposed.
    pub async fn changed(&self) -> Option<FetchState<T>> {
        let mut rx = self.subscribe();
        tokio::select! {
            res = rx.changed() => res.ok()?,
            _ = self.lifetime.cancelled() => return None,
        }
        Some(self.state())
    }
}

impl<T> FetchStateEngine<T> {
    /// True after [`dispose`](Self::dispose).
    pub fn is_disposed(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Stops the driver, drops the poll timer and invalidates in-flight work.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        if self.lifetime.is_cancelled() {
            return;
        }
        self.lifetime.cancel();
        self.shared.cell.invalidate();
    }
}

impl<T> Drop for FetchStateEngine<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builder for [`FetchStateEngine`].
pub struct FetchBuilder<T> {
    producer: ProducerRef<T>,
    initial: T,
    deps: Deps,
    options: FetchOptions,
}

impl<T> FetchBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a builder with no dependencies and default options.
    pub fn new(producer: ProducerRef<T>, initial: T) -> Self {
        Self {
            producer,
            initial,
            deps: Deps::new(),
            options: FetchOptions::default(),
        }
    }

    /// Sets the initial dependency identity.
    pub fn deps(mut self, deps: Deps) -> Self {
        self.deps = deps;
        self
    }

    /// Enables polling (`Duration::ZERO` disables it).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Treats producers failing before their first suspension as not ready.
    pub fn initial_promise_purity(mut self, enabled: bool) -> Self {
        self.options.initial_promise_purity = enabled;
        self
    }

    /// Resets `data` to the initial value on dependency changes.
    pub fn reset_on_change(mut self, enabled: bool) -> Self {
        self.options.reset_on_change = enabled;
        self
    }

    /// Label used in events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    /// Publishes lifecycle events to `bus`.
    pub fn bus(mut self, bus: Bus) -> Self {
        self.options.bus = Some(bus);
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Spawns the engine.
    pub fn build(self) -> FetchStateEngine<T> {
        FetchStateEngine::initialize(self.producer, self.deps, self.initial, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::producer::ProducerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{self, Instant, sleep};

    fn scripted(script: Vec<Result<&'static str, FetchError>>) -> (ProducerRef<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let script = Arc::new(script);
        let producer = ProducerFn::arc(move |_ctx: CancellationToken| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let script = Arc::clone(&script);
            async move {
                let step = script.get(n).or(script.last()).cloned();
                step.unwrap_or(Err(FetchError::not_ready("empty script")))
                    .map(str::to_string)
            }
        });
        (producer, calls)
    }

    fn delayed(value: &'static str, delay: Duration) -> ProducerRef<String> {
        ProducerFn::arc(move |_ctx: CancellationToken| async move {
            sleep(delay).await;
            Ok(value.to_string())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_invocation_never_lands() {
        let engine = FetchStateEngine::builder(delayed("A", Duration::from_millis(100)), String::new())
            .deps(Deps::new().with("a"))
            .build();
        sleep(Duration::from_millis(5)).await;

        let state = engine.observe(Deps::new().with("b"), || delayed("B", Duration::from_millis(10)));
        assert!(!state.loaded);

        sleep(Duration::from_millis(500)).await;
        let snap = engine.snapshot();
        assert_eq!(snap.data, "B");
        assert!(snap.loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_is_never_an_error() {
        let (producer, calls) = scripted(vec![Err(FetchError::not_ready("namespace"))]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .poll_interval(Duration::from_secs(1))
            .build();

        sleep(Duration::from_millis(3500)).await;
        let snap = engine.snapshot();
        assert!(!snap.loaded);
        assert_eq!(snap.error, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn error_then_success_clears_error() {
        let (producer, _calls) = scripted(vec![Err(FetchError::fail("503")), Ok("models")]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .poll_interval(Duration::from_secs(1))
            .build();

        sleep(Duration::from_millis(10)).await;
        let snap = engine.snapshot();
        assert!(snap.loaded);
        assert_eq!(snap.error, Some(FetchError::fail("503")));

        sleep(Duration::from_secs(1)).await;
        let snap = engine.snapshot();
        assert_eq!(snap.data, "models");
        assert_eq!(snap.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_identity_follows_dependency_identity() {
        let (producer, _calls) = scripted(vec![Ok("x")]);
        let engine = FetchStateEngine::builder(Arc::clone(&producer), String::new())
            .deps(Deps::new().with("ns"))
            .build();

        let first = engine.observe(Deps::new().with("ns"), || unreachable!("deps unchanged"));
        let again = engine.observe(Deps::new().with("ns"), || unreachable!("deps unchanged"));
        assert_eq!(first.refresh, again.refresh);

        let other = engine.observe(Deps::new().with("other"), || Arc::clone(&producer));
        assert_ne!(first.refresh, other.refresh);
        assert_eq!(engine.refresh(), other.refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_runs_once_per_interval_without_overlap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let (c, r) = (Arc::clone(&calls), Arc::clone(&running));
        let producer = ProducerFn::arc(move |_ctx: CancellationToken| {
            let (c, r) = (Arc::clone(&c), Arc::clone(&r));
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                assert_eq!(r.fetch_add(1, Ordering::SeqCst), 0, "overlapping invocation");
                sleep(Duration::from_millis(400)).await;
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(1_u32)
            }
        });
        let engine = FetchStateEngine::builder(producer, 0)
            .poll_interval(Duration::from_secs(1))
            .build();

        // Invocations start at 0, 1.4s, 2.8s, 4.2s.
        sleep(Duration::from_millis(4300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(engine.snapshot().loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_then_values_on_successive_ticks() {
        let (producer, _calls) = scripted(vec![Err(FetchError::not_ready("namespace")), Ok("A"), Ok("B")]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .poll_interval(Duration::from_millis(1000))
            .build();
        let start = Instant::now();

        time::sleep_until(start + Duration::from_millis(10)).await;
        let snap = engine.snapshot();
        assert!(!snap.loaded);
        assert_eq!(snap.error, None);

        time::sleep_until(start + Duration::from_millis(1010)).await;
        let snap = engine.snapshot();
        assert_eq!((snap.data.as_str(), snap.loaded), ("A", true));

        time::sleep_until(start + Duration::from_millis(2010)).await;
        let snap = engine.snapshot();
        assert_eq!((snap.data.as_str(), snap.loaded), ("B", true));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_reports_its_outcome() {
        let (producer, calls) = scripted(vec![Ok("first"), Err(FetchError::fail("boom")), Ok("third")]);
        let engine = FetchStateEngine::builder(producer, String::new()).build();
        sleep(Duration::from_millis(1)).await;

        let refresh = engine.refresh();
        assert_eq!(refresh.try_refresh().await, Err(FetchError::fail("boom")));
        assert_eq!(engine.snapshot().error, Some(FetchError::fail("boom")));
        assert_eq!(refresh.refresh().await.as_deref(), Some("third"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_superseded_by_dependency_change_yields_none() {
        let engine = FetchStateEngine::builder(delayed("slow", Duration::from_secs(5)), String::new())
            .deps(Deps::new().with(1_u32))
            .build();
        let refresh = engine.refresh();

        let pending = tokio::spawn(async move { refresh.try_refresh().await });
        sleep(Duration::from_millis(10)).await;
        engine.observe(Deps::new().with(2_u32), || delayed("fast", Duration::from_millis(1)));

        assert_eq!(pending.await.expect("join"), Ok(None));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.snapshot().data, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_supersedes_slow_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let producer = ProducerFn::arc(move |_ctx: CancellationToken| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    sleep(Duration::from_secs(5)).await;
                    Ok(String::from("A"))
                } else {
                    sleep(Duration::from_millis(10)).await;
                    Ok(String::from("B"))
                }
            }
        });
        let engine = FetchStateEngine::builder(producer, String::new()).build();
        sleep(Duration::from_millis(10)).await;

        let slow = engine.refresh();
        let pending = tokio::spawn(async move { slow.try_refresh().await });
        sleep(Duration::from_millis(10)).await;

        assert_eq!(engine.refresh().refresh().await.as_deref(), Some("B"));
        assert_eq!(pending.await.expect("join"), Ok(None));

        sleep(Duration::from_secs(10)).await;
        let snap = engine.snapshot();
        assert_eq!(snap.data, "B");
        assert!(snap.loaded);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn self_reported_cancel_keeps_polling() {
        let (producer, calls) = scripted(vec![Err(FetchError::Canceled), Ok("v")]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .poll_interval(Duration::from_secs(1))
            .build();

        sleep(Duration::from_millis(10)).await;
        assert!(!engine.snapshot().loaded);

        sleep(Duration::from_millis(1500)).await;
        let snap = engine.snapshot();
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert!(snap.loaded);
        assert_eq!(snap.data, "v");
    }

    #[tokio::test(start_paused = true)]
    async fn producer_factory_may_read_the_engine() {
        let (producer, _calls) = scripted(vec![Ok("x")]);
        let engine = FetchStateEngine::builder(Arc::clone(&producer), String::new())
            .deps(Deps::new().with(1_u32))
            .build();
        sleep(Duration::from_millis(1)).await;

        let state = engine.observe(Deps::new().with(2_u32), || {
            let current = engine.state();
            assert!(current.loaded);
            Arc::clone(&producer)
        });
        assert!(!state.loaded);
        assert_eq!(engine.refresh(), state.refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn observe_after_dispose_leaves_state_alone() {
        let bus = Bus::new(16);
        let (producer, _calls) = scripted(vec![Ok("kept")]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .deps(Deps::new().with("a"))
            .bus(bus.clone())
            .build();
        sleep(Duration::from_millis(1)).await;

        engine.dispose();
        let mut rx = bus.subscribe();
        let state = engine.observe(Deps::new().with("b"), || unreachable!("engine disposed"));

        assert!(state.loaded);
        assert_eq!(state.data, "kept");
        sleep(Duration::from_millis(10)).await;
        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.kind, EventKind::FetchRebound);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_on_change_restores_initial_data() {
        let (producer, _calls) = scripted(vec![Ok("loaded")]);
        let engine = FetchStateEngine::builder(Arc::clone(&producer), String::from("initial"))
            .reset_on_change(true)
            .build();
        sleep(Duration::from_millis(1)).await;
        assert_eq!(engine.snapshot().data, "loaded");

        let state = engine.observe(Deps::new().with("next"), || delayed("later", Duration::from_secs(1)));
        assert_eq!(state.data, "initial");
        assert!(!state.loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn purity_flag_turns_immediate_failure_into_not_ready() {
        let (producer, _calls) = scripted(vec![Err(FetchError::fail("input missing"))]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .initial_promise_purity(true)
            .build();
        sleep(Duration::from_millis(1)).await;

        let snap = engine.snapshot();
        assert!(!snap.loaded);
        assert_eq!(snap.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_producer_becomes_a_failure() {
        let producer: ProducerRef<u32> = ProducerFn::arc(|_ctx: CancellationToken| async move {
            if true {
                panic!("kaboom");
            }
            Ok(0_u32)
        });
        let engine = FetchStateEngine::builder(producer, 0).build();
        sleep(Duration::from_millis(1)).await;

        let snap = engine.snapshot();
        assert!(snap.loaded);
        assert!(matches!(snap.error, Some(FetchError::Fail { ref error }) if error.contains("kaboom")));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_stops_polling_and_late_results() {
        let (producer, calls) = scripted(vec![Ok("v")]);
        let engine = FetchStateEngine::builder(producer, String::new())
            .poll_interval(Duration::from_secs(1))
            .build();
        sleep(Duration::from_millis(10)).await;
        let before = engine.snapshot().data;

        engine.dispose();
        assert!(engine.is_disposed());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!engine.refresh().trigger());
        assert_eq!(engine.snapshot().data, before);
        assert!(engine.changed().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_events_reach_the_bus() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let (producer, _calls) = scripted(vec![Ok("v")]);
        let _engine = FetchStateEngine::builder(producer, String::new())
            .name("models")
            .bus(bus.clone())
            .build();
        sleep(Duration::from_millis(1)).await;

        let starting = rx.recv().await.expect("starting");
        assert_eq!(starting.kind, EventKind::FetchStarting);
        assert_eq!(starting.source.as_deref(), Some("models"));
        let resolved = rx.recv().await.expect("resolved");
        assert_eq!(resolved.kind, EventKind::FetchResolved);
    }
}
