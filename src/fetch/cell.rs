//! # AsyncResultCell: single-slot holder of the latest fetch result.
//!
//! The cell owns the engine's [`Generation`] counter and the published [`Snapshot`].
//! Every write goes through one place and is checked against the generation:
//!
//! ```text
//! begin()    ──► bump generation, capture Epoch(g)       (new invocation)
//! rebind()   ──► bump generation, loaded=false, error=None (dependency change)
//! invalidate()─► bump generation                          (disposal)
//! resolve(g, result)
//!   ├─ g != current ──► Applied::Stale      (nothing written, nobody notified)
//!   ├─ Ok(v)        ──► data=v, loaded=true, error=None
//!   ├─ NotReady     ──► loaded=false, error=None
//!   └─ Err(e)       ──► loaded=true, error=Some(e)
//! ```
//!
//! ## Rules
//! - Bumps and writes are serialized under the watch channel lock, so a result can never be
//!   applied after a bump that superseded it.
//! - Stale results do not notify receivers.

use tokio::sync::watch;

use crate::error::FetchError;
use crate::stale::{Epoch, Generation};

/// Published state of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Last resolved value, or the initial value.
    pub data: T,
    /// True once the current dependency identity resolved (value or real error).
    pub loaded: bool,
    /// Last real error; cleared by the next success.
    pub error: Option<FetchError>,
}

/// What [`AsyncResultCell::resolve`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Value stored.
    Resolved,
    /// Error stored.
    Failed,
    /// Not-ready sentinel observed; `loaded` reset.
    NotReady,
    /// Result belonged to a superseded epoch and was discarded.
    Stale,
}

impl Applied {
    /// True when the result settled the current epoch.
    pub fn is_settled(self) -> bool {
        !matches!(self, Applied::Stale)
    }
}

/// Single-slot holder for the latest result of a fetch.
#[derive(Debug)]
pub struct AsyncResultCell<T> {
    generation: Generation,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T> AsyncResultCell<T> {
    /// Creates a cell holding `initial`, not loaded, at epoch 0.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(Snapshot {
            data: initial,
            loaded: false,
            error: None,
        });
        Self {
            generation: Generation::new(),
            tx,
        }
    }

    /// Starts a new invocation: supersedes every earlier epoch.
    pub fn begin(&self) -> Epoch {
        let mut epoch = self.generation.current();
        self.tx.send_if_modified(|_| {
            epoch = self.generation.bump();
            false
        });
        epoch
    }

    /// Supersedes every earlier epoch without touching the published state.
    pub fn invalidate(&self) -> Epoch {
        self.begin()
    }

    /// Dependency identity changed: supersede in-flight work and reset `loaded`/`error`.
    ///
    /// With `reset = Some(v)` the data is replaced as well.
    pub fn rebind(&self, reset: Option<T>) -> Epoch {
        let mut epoch = self.generation.current();
        self.tx.send_if_modified(|slot| {
            epoch = self.generation.bump();
            let changed = slot.loaded || slot.error.is_some() || reset.is_some();
            slot.loaded = false;
            slot.error = None;
            if let Some(initial) = reset {
                slot.data = initial;
            }
            changed
        });
        epoch
    }

    /// Applies `result` if `epoch` is still current.
    pub fn resolve(&self, epoch: Epoch, result: Result<T, FetchError>) -> Applied {
        let mut applied = Applied::Stale;
        self.tx.send_if_modified(|slot| {
            if !self.generation.is_current(epoch) {
                return false;
            }
            applied = match result {
                Ok(data) => {
                    slot.data = data;
                    slot.loaded = true;
                    slot.error = None;
                    Applied::Resolved
                }
                Err(FetchError::NotReady { .. }) => {
                    slot.loaded = false;
                    slot.error = None;
                    Applied::NotReady
                }
                Err(FetchError::Canceled) => return false,
                Err(e) => {
                    slot.loaded = true;
                    slot.error = Some(e);
                    Applied::Failed
                }
            };
            true
        });
        applied
    }

    /// True if `epoch` has not been superseded.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.generation.is_current(epoch)
    }

    /// Epoch currently in effect.
    pub fn epoch(&self) -> Epoch {
        self.generation.current()
    }

    /// True once the current identity has resolved.
    pub fn is_loaded(&self) -> bool {
        self.tx.borrow().loaded
    }

    /// Receiver notified on every applied change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }
}

impl<T: Clone> AsyncResultCell<T> {
    /// Clones the published state.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }
}
