//! # Fetch driver: the invocation state machine of one engine.
//!
//! Each [`FetchStateEngine`](crate::FetchStateEngine) spawns exactly one driver task.
//! The driver is the only place where producer invocations are started, and it keeps
//! at most one of them alive:
//!
//! ```text
//!            ┌──────────── Refresh / Rebind / poll tick ────────────┐
//!            ▼                                                      │
//!  Idle ──► InFlight(epoch) ── settles ──► resolve(epoch, result) ──┤
//!            │                             ├─ epoch gone → Idle (no timer)
//!            │                             └─ otherwise  → Idle + poll timer (if enabled)
//!            └── superseded ──► token cancelled, future dropped, waiters get Ok(None)
//! ```
//!
//! ## Rules
//! - Commands are handled **before** settlements and timers (biased select), so a pending
//!   rebind always supersedes the invocation it invalidated.
//! - The poll timer is armed only after a settlement of the current epoch; a hung producer
//!   therefore gates polling.
//! - Reading the producer and capturing the epoch happen under the binding lock, so an
//!   invocation can never run the previous producer under the new epoch.

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Sleep};
use tokio_util::sync::CancellationToken;

use crate::core::runner::{Settled, run_guarded};
use crate::error::FetchError;
use crate::events::{Bus, Event, EventKind};
use crate::fetch::cell::{Applied, AsyncResultCell};
use crate::fetch::deps::Deps;
use crate::fetch::producer::{BoxFetchFuture, ProducerRef};
use crate::fetch::state::FetchRefresh;
use crate::stale::Epoch;

/// Reply channel of a waiting [`FetchRefresh::try_refresh`] caller.
pub(crate) type RefreshReply<T> = oneshot::Sender<Result<Option<T>, FetchError>>;

/// Messages from engine handles to the driver.
pub(crate) enum Command<T> {
    /// Start an out-of-band invocation, optionally reporting its outcome.
    Refresh { reply: Option<RefreshReply<T>> },
    /// The dependency identity changed; the cell generation was already bumped.
    Rebind,
}

/// Producer currently bound to the engine, with the identity it was bound under.
pub(crate) struct Binding<T> {
    pub deps: Deps,
    pub producer: ProducerRef<T>,
    pub refresh: FetchRefresh<T>,
}

/// State shared by the engine handle and its driver.
pub(crate) struct Shared<T> {
    pub cell: AsyncResultCell<T>,
    pub binding: Mutex<Binding<T>>,
    pub name: Arc<str>,
    pub bus: Option<Bus>,
}

impl<T> Shared<T> {
    pub fn binding(&self) -> MutexGuard<'_, Binding<T>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_source(Arc::clone(&self.name)));
        }
    }
}

type InvocationFuture<T> = Pin<Box<dyn Future<Output = Settled<Result<T, FetchError>>> + Send>>;

/// The single invocation a driver keeps alive.
struct InFlight<T> {
    epoch: Epoch,
    token: CancellationToken,
    fut: InvocationFuture<T>,
    waiters: Vec<RefreshReply<T>>,
}

impl<T> InFlight<T> {
    /// Cancels the invocation; its waiters observe `Ok(None)`.
    fn supersede(self) {
        self.token.cancel();
        for waiter in self.waiters {
            let _ = waiter.send(Ok(None));
        }
    }
}

/// Tunables the driver needs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DriverParams {
    pub poll_interval: Option<Duration>,
    pub initial_promise_purity: bool,
}

pub(crate) struct FetchDriver<T> {
    shared: Arc<Shared<T>>,
    rx: mpsc::UnboundedReceiver<Command<T>>,
    lifetime: CancellationToken,
    params: DriverParams,
}

impl<T> FetchDriver<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        shared: Arc<Shared<T>>,
        rx: mpsc::UnboundedReceiver<Command<T>>,
        lifetime: CancellationToken,
        params: DriverParams,
    ) -> Self {
        Self {
            shared,
            rx,
            lifetime,
            params,
        }
    }

    /// Runs until the engine is disposed or every handle is gone.
    pub async fn run(mut self) {
        let mut inflight: Option<InFlight<T>> = None;
        let mut poll: Option<Pin<Box<Sleep>>> = None;

        self.start(&mut inflight, None);

        loop {
            tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Refresh { reply }) => {
                        poll = None;
                        self.start(&mut inflight, reply);
                    }
                    Some(Command::Rebind) => {
                        poll = None;
                        self.start(&mut inflight, None);
                    }
                    None => break,
                },
                settled = settle(&mut inflight) => {
                    if let Some(current) = inflight.take() {
                        poll = self.finish(current, settled);
                    }
                }
                _ = tick(&mut poll) => {
                    poll = None;
                    self.start(&mut inflight, None);
                }
            }
        }

        if let Some(current) = inflight.take() {
            current.supersede();
        }
        self.shared.publish(Event::new(EventKind::FetchDisposed));
    }

    /// Supersedes the in-flight invocation (if any) and starts a new one.
    fn start(&self, inflight: &mut Option<InFlight<T>>, reply: Option<RefreshReply<T>>) {
        if let Some(previous) = inflight.take() {
            previous.supersede();
        }

        let (producer, epoch) = {
            let binding = self.shared.binding();
            (Arc::clone(&binding.producer), self.shared.cell.begin())
        };
        let purity = self.params.initial_promise_purity && !self.shared.cell.is_loaded();

        let token = self.lifetime.child_token();
        let attempt_token = token.clone();
        let fut: InvocationFuture<T> = Box::pin(async move {
            let produced = producer.produce(attempt_token.clone());
            let guarded = async move {
                if purity {
                    treat_immediate_failure_as_not_ready(produced).await
                } else {
                    produced.await
                }
            };
            run_guarded(&attempt_token, guarded).await
        });

        self.shared
            .publish(Event::new(EventKind::FetchStarting).with_generation(epoch.get()));

        *inflight = Some(InFlight {
            epoch,
            token,
            fut,
            waiters: reply.into_iter().collect(),
        });
    }

    /// Applies a settled invocation and returns the next poll timer, if any.
    fn finish(
        &self,
        current: InFlight<T>,
        settled: Settled<Result<T, FetchError>>,
    ) -> Option<Pin<Box<Sleep>>> {
        let result = match settled {
            Settled::Completed(result) => result,
            Settled::Canceled => Err(FetchError::Canceled),
            Settled::Panicked(msg) => Err(FetchError::fail(format!("producer panicked: {msg}"))),
        };

        let applied = self.shared.cell.resolve(current.epoch, result.clone());
        let generation = current.epoch.get();
        let reply = match (&applied, result) {
            (Applied::Stale, _) => Ok(None),
            (_, Ok(data)) => {
                self.shared
                    .publish(Event::new(EventKind::FetchResolved).with_generation(generation));
                Ok(Some(data))
            }
            (Applied::NotReady, Err(e)) => {
                self.shared.publish(
                    Event::new(EventKind::FetchNotReady)
                        .with_generation(generation)
                        .with_reason(e.as_message()),
                );
                Err(e)
            }
            (_, Err(e)) => {
                self.shared.publish(
                    Event::new(EventKind::FetchFailed)
                        .with_generation(generation)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        };
        for waiter in current.waiters {
            let _ = waiter.send(reply.clone());
        }

        // A producer may report `Canceled` on its own; only a superseded epoch stops polling.
        if !applied.is_settled() && !self.shared.cell.is_current(current.epoch) {
            return None;
        }
        let interval = self.params.poll_interval?;
        self.shared
            .publish(Event::new(EventKind::PollScheduled).with_delay(interval));
        Some(Box::pin(time::sleep(interval)))
    }
}

/// Resolves when the in-flight invocation settles; pending forever when idle.
async fn settle<T>(inflight: &mut Option<InFlight<T>>) -> Settled<Result<T, FetchError>> {
    match inflight {
        Some(current) => current.fut.as_mut().await,
        None => pending().await,
    }
}

/// Resolves when the poll timer fires; pending forever when no timer is armed.
async fn tick(poll: &mut Option<Pin<Box<Sleep>>>) {
    match poll {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

/// Compatibility behaviour for producers that fail before ever suspending.
///
/// Such failures usually mean the inputs captured by the producer were not initialised
/// yet, so they are reported as [`FetchError::NotReady`] instead of a visible error.
async fn treat_immediate_failure_as_not_ready<T>(mut fut: BoxFetchFuture<T>) -> Result<T, FetchError> {
    match futures::poll!(fut.as_mut()) {
        Poll::Ready(Err(FetchError::Fail { error })) => Err(FetchError::NotReady { reason: error }),
        Poll::Ready(res) => res,
        Poll::Pending => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn immediate_failure_becomes_not_ready() {
        let fut: BoxFetchFuture<u32> = Box::pin(async { Err(FetchError::fail("deps not initialised")) });
        let res = treat_immediate_failure_as_not_ready(fut).await;
        assert_eq!(res, Err(FetchError::not_ready("deps not initialised")));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_suspension_stays_a_failure() {
        let fut: BoxFetchFuture<u32> = Box::pin(async {
            time::sleep(Duration::from_millis(1)).await;
            Err(FetchError::fail("503"))
        });
        let res = treat_immediate_failure_as_not_ready(fut).await;
        assert_eq!(res, Err(FetchError::fail("503")));
    }

    #[tokio::test]
    async fn immediate_success_passes_through() {
        let fut: BoxFetchFuture<u32> = Box::pin(async { Ok(3) });
        assert_eq!(treat_immediate_failure_as_not_ready(fut).await, Ok(3));
    }
}
