//! # Watch registry: the single scheduling loop of a notification watcher.
//!
//! The registry owns every registered [`WatchTask`] and is the only place where the
//! task map is mutated. Handles talk to it through [`RegistryCommand`]s.
//!
//! ## Architecture
//! ```text
//! NotificationWatcher ── RegistryCommand ──► Registry::run()
//!                                              ├─► Register(id, task)  → insert, start attempt 1
//!                                              ├─► Unregister(id)      → cancel token, drop timer, remove
//!                                              ├─► List / Status       → answered from the map
//!                                              └─► Shutdown            → teardown, reply
//!
//! attempts: JoinSet<AttemptDone>      repolls: DelayQueue<WatchId>
//!     │                                   │
//!     └─► on_attempt(id, attempt, settled)└─► expired(id) → start next attempt
//!           ├─ Repoll          → Scheduled(interval)
//!           ├─ Stop            → removed
//!           ├─ Error/Success   → Notify::notify(..), removed
//!           ├─ Fail / panic    → error notification (default title), removed
//!           └─ Canceled        → removed silently
//! ```
//!
//! ## Rules
//! - A task has **one** attempt in flight at most; the next one is only scheduled after
//!   the current one settled with `Repoll`.
//! - Results of attempts whose task was removed (or whose attempt number no longer
//!   matches) are ignored: no notification, no reschedule.
//! - Each task owns a child token of the watcher lifetime; each attempt a child of that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};

use crate::core::runner::{Settled, run_guarded};
use crate::error::{RuntimeError, WatchError};
use crate::events::{Bus, Event, EventKind};
use crate::watch::notify::{Notification, Notify, Severity};
use crate::watch::outcome::{Notice, WatchOutcome};
use crate::watch::task::{WatchId, WatchTask};

/// Scheduling phase of a registered task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchStatus {
    /// An attempt is running.
    InFlight,
    /// Waiting for the repoll timer.
    Scheduled,
}

/// Registry view of one task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchInfo {
    pub id: WatchId,
    pub name: String,
    pub status: WatchStatus,
    /// Attempts started so far (1-based).
    pub attempts: u32,
}

pub(crate) enum RegistryCommand {
    Register {
        id: WatchId,
        task: WatchTask,
    },
    Unregister {
        id: WatchId,
        reply: oneshot::Sender<Result<(), WatchError>>,
    },
    List {
        reply: oneshot::Sender<Vec<WatchInfo>>,
    },
    Status {
        id: WatchId,
        reply: oneshot::Sender<Option<WatchInfo>>,
    },
    Shutdown {
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum Phase {
    InFlight,
    Scheduled(delay_queue::Key),
}

struct Entry {
    task: WatchTask,
    token: CancellationToken,
    phase: Phase,
    attempt: u32,
}

impl Entry {
    fn info(&self, id: WatchId) -> WatchInfo {
        WatchInfo {
            id,
            name: self.task.name().to_string(),
            status: match self.phase {
                Phase::InFlight => WatchStatus::InFlight,
                Phase::Scheduled(_) => WatchStatus::Scheduled,
            },
            attempts: self.attempt,
        }
    }
}

struct AttemptDone {
    id: WatchId,
    attempt: u32,
    settled: Settled<Result<WatchOutcome, WatchError>>,
}

/// Parameters shared by every task of a watcher.
#[derive(Clone, Debug)]
pub(crate) struct RegistryParams {
    pub default_interval: Duration,
    pub grace: Duration,
    pub error_title: Arc<str>,
}

pub(crate) struct Registry {
    entries: HashMap<WatchId, Entry>,
    attempts: JoinSet<AttemptDone>,
    repolls: DelayQueue<WatchId>,
    notifier: Arc<dyn Notify>,
    bus: Bus,
    lifetime: CancellationToken,
    params: RegistryParams,
}

impl Registry {
    pub fn new(notifier: Arc<dyn Notify>, bus: Bus, lifetime: CancellationToken, params: RegistryParams) -> Self {
        Self {
            entries: HashMap::new(),
            attempts: JoinSet::new(),
            repolls: DelayQueue::new(),
            notifier,
            bus,
            lifetime,
            params,
        }
    }

    /// Runs until shutdown, lifetime cancellation or until every handle is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RegistryCommand>) {
        let reply = loop {
            tokio::select! {
                biased;
                _ = self.lifetime.cancelled() => break None,
                cmd = rx.recv() => match cmd {
                    Some(RegistryCommand::Shutdown { reply }) => break Some(reply),
                    Some(cmd) => self.handle(cmd),
                    None => break None,
                },
                Some(joined) = self.attempts.join_next(), if !self.attempts.is_empty() => match joined {
                    Ok(done) => self.on_attempt(done),
                    Err(e) => tracing::warn!(event = "watch.attempt_lost", error = %e),
                },
                Some(expired) = self.repolls.next(), if !self.repolls.is_empty() => {
                    self.on_repoll(expired.into_inner());
                }
            }
        };

        let res = self.teardown().await;
        match reply {
            Some(reply) => {
                let _ = reply.send(res);
            }
            None => {
                if let Err(e) = res {
                    tracing::warn!(event = "watch.teardown", error = %e);
                }
            }
        }
    }

    fn handle(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { id, task } => self.register(id, task),
            RegistryCommand::Unregister { id, reply } => {
                let _ = reply.send(self.unregister(id));
            }
            RegistryCommand::List { reply } => {
                let mut all: Vec<WatchInfo> = self.entries.iter().map(|(id, e)| e.info(*id)).collect();
                all.sort_unstable_by_key(|info| info.id);
                let _ = reply.send(all);
            }
            RegistryCommand::Status { id, reply } => {
                let _ = reply.send(self.entries.get(&id).map(|e| e.info(id)));
            }
            RegistryCommand::Shutdown { .. } => {}
        }
    }

    fn register(&mut self, id: WatchId, task: WatchTask) {
        self.bus
            .publish(self.event(EventKind::WatchRegistered, id, task.name()));
        let entry = Entry {
            task,
            token: self.lifetime.child_token(),
            phase: Phase::InFlight,
            attempt: 0,
        };
        self.entries.insert(id, entry);
        self.start_attempt(id);
    }

    fn unregister(&mut self, id: WatchId) -> Result<(), WatchError> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(WatchError::NotFound { id: id.get() })?;
        entry.token.cancel();
        if let Phase::Scheduled(key) = entry.phase {
            self.repolls.remove(&key);
        }
        self.bus
            .publish(self.event(EventKind::WatchCancelled, id, entry.task.name()));
        self.bus
            .publish(self.event(EventKind::WatchRemoved, id, entry.task.name()));
        Ok(())
    }

    /// Spawns the next attempt of `id`.
    fn start_attempt(&mut self, id: WatchId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.attempt += 1;
        entry.phase = Phase::InFlight;

        let attempt = entry.attempt;
        let token = entry.token.child_token();
        let callback = Arc::clone(entry.task.callback());
        let name = entry.task.name().to_string();

        self.attempts.spawn(async move {
            let ctx = token.clone();
            let settled = run_guarded(&token, async move { callback.check(ctx).await }).await;
            AttemptDone { id, attempt, settled }
        });
        self.bus.publish(
            self.event(EventKind::AttemptStarting, id, &name)
                .with_attempt(attempt),
        );
    }

    fn on_repoll(&mut self, id: WatchId) {
        if self.entries.contains_key(&id) {
            self.start_attempt(id);
        }
    }

    fn on_attempt(&mut self, done: AttemptDone) {
        let AttemptDone { id, attempt, settled } = done;
        match self.entries.get(&id) {
            Some(entry) if entry.attempt == attempt && matches!(entry.phase, Phase::InFlight) => {}
            _ => return,
        }

        let outcome = match settled {
            Settled::Completed(Ok(outcome)) => outcome,
            Settled::Completed(Err(WatchError::Canceled)) | Settled::Canceled => {
                self.remove(id, EventKind::WatchCancelled);
                return;
            }
            Settled::Completed(Err(e)) => {
                WatchOutcome::Error(Notice::new(&*self.params.error_title, e.as_message()))
            }
            Settled::Panicked(msg) => WatchOutcome::Error(Notice::new(&*self.params.error_title, msg)),
        };

        match outcome {
            WatchOutcome::Repoll => self.schedule(id, attempt),
            WatchOutcome::Stop => self.remove(id, EventKind::WatchStopped),
            WatchOutcome::Error(notice) => self.raise(id, attempt, Severity::Error, notice),
            WatchOutcome::Success(notice) => self.raise(id, attempt, Severity::Success, notice),
        }
    }

    fn schedule(&mut self, id: WatchId, attempt: u32) {
        let default = self.params.default_interval;
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        let delay = entry.task.interval().unwrap_or(default);
        entry.phase = Phase::Scheduled(self.repolls.insert(id, delay));

        let ev = Event::new(EventKind::RepollScheduled)
            .with_source(entry.task.name())
            .with_watch(id.get())
            .with_attempt(attempt)
            .with_delay(delay);
        self.bus.publish(ev);
    }

    fn raise(&mut self, id: WatchId, attempt: u32, severity: Severity, notice: Notice) {
        let Some(entry) = self.entries.remove(&id) else {
            return;
        };
        let name = entry.task.name();
        self.bus.publish(
            self.event(EventKind::NotificationRaised, id, name)
                .with_attempt(attempt)
                .with_reason(notice.title.as_str()),
        );
        self.notifier
            .notify(Notification::from_notice(id, severity, notice));
        self.bus
            .publish(self.event(EventKind::WatchRemoved, id, name));
    }

    fn remove(&mut self, id: WatchId, kind: EventKind) {
        if let Some(entry) = self.entries.remove(&id) {
            self.bus.publish(self.event(kind, id, entry.task.name()));
            self.bus
                .publish(self.event(EventKind::WatchRemoved, id, entry.task.name()));
        }
    }

    /// Cancels every task and waits up to `grace` for in-flight attempts.
    async fn teardown(&mut self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.lifetime.cancel();
        self.repolls.clear();

        let grace = self.params.grace;
        let entries = &mut self.entries;
        let attempts = &mut self.attempts;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = attempts.join_next().await {
                if let Ok(done) = joined {
                    entries.remove(&done.id);
                }
            }
        })
        .await;

        let stuck: Vec<String> = {
            let mut inflight: Vec<(&WatchId, &Entry)> = self
                .entries
                .iter()
                .filter(|(_, e)| matches!(e.phase, Phase::InFlight))
                .collect();
            inflight.sort_unstable_by_key(|(id, _)| **id);
            inflight.into_iter().map(|(_, e)| e.task.name().to_string()).collect()
        };
        self.attempts.abort_all();

        for (id, entry) in self.entries.drain() {
            let ev = Event::new(EventKind::WatchCancelled)
                .with_source(entry.task.name())
                .with_watch(id.get());
            self.bus.publish(ev);
        }

        match drained {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) if stuck.is_empty() => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    fn event(&self, kind: EventKind, id: WatchId, name: &str) -> Event {
        Event::new(kind).with_source(name).with_watch(id.get())
    }
}
