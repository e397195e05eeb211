//! # Externally visible fetch state.
//!
//! [`FetchState`] is what UI code consumes: the latest data, the `loaded` flag, the last
//! real error and a [`FetchRefresh`] handle. Callers destructure it positionally via
//! [`FetchState::into_tuple`]; the order `(data, loaded, error, refresh)` is part of the contract.
//!
//! ## Refresh identity
//! `FetchRefresh` compares by **identity** (pointer equality). The engine hands out the
//! same handle for as long as the dependency identity is unchanged, so consumers can keep
//! it in their own dependency lists without triggering spurious work.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::FetchError;
use crate::fetch::cell::Snapshot;
use crate::fetch::driver::Command;

/// Latest state of a [`FetchStateEngine`](crate::FetchStateEngine).
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    /// Last resolved value, or the initial value before the first resolution.
    pub data: T,
    /// True once an invocation for the current dependency identity settled.
    pub loaded: bool,
    /// Last real error, cleared by the next successful resolution.
    pub error: Option<FetchError>,
    /// Out-of-band refresh trigger.
    pub refresh: FetchRefresh<T>,
}

impl<T> FetchState<T> {
    pub(crate) fn from_snapshot(snapshot: Snapshot<T>, refresh: FetchRefresh<T>) -> Self {
        Self {
            data: snapshot.data,
            loaded: snapshot.loaded,
            error: snapshot.error,
            refresh,
        }
    }

    /// Positional view `(data, loaded, error, refresh)`.
    pub fn into_tuple(self) -> (T, bool, Option<FetchError>, FetchRefresh<T>) {
        (self.data, self.loaded, self.error, self.refresh)
    }
}

struct RefreshInner<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
}

/// Handle that triggers an out-of-band invocation.
///
/// Cheap to clone; clones are identical to the original.
pub struct FetchRefresh<T> {
    inner: Arc<RefreshInner<T>>,
}

impl<T> FetchRefresh<T> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command<T>>) -> Self {
        Self {
            inner: Arc::new(RefreshInner { tx }),
        }
    }

    /// Requests an invocation without waiting for it.
    ///
    /// Returns `false` if the engine has been disposed.
    pub fn trigger(&self) -> bool {
        self.inner.tx.send(Command::Refresh { reply: None }).is_ok()
    }

    /// Triggers an invocation and waits for it to settle.
    ///
    /// - `Ok(Some(v))`: the invocation resolved and `v` is now the engine's data;
    /// - `Ok(None)`: the invocation was superseded, or the engine is disposed;
    /// - `Err(e)`: the invocation failed (including [`FetchError::NotReady`]).
    ///
    /// The engine state is updated exactly as for a polled invocation.
    pub async fn try_refresh(&self) -> Result<Option<T>, FetchError> {
        let (reply, rx) = oneshot::channel();
        if self
            .inner
            .tx
            .send(Command::Refresh { reply: Some(reply) })
            .is_err()
        {
            return Ok(None);
        }
        rx.await.unwrap_or(Ok(None))
    }

    /// Triggers an invocation and returns its value, or `None` on error/staleness.
    pub async fn refresh(&self) -> Option<T> {
        self.try_refresh().await.ok().flatten()
    }
}

impl<T> Clone for FetchRefresh<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for FetchRefresh<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for FetchRefresh<T> {}

impl<T> fmt::Debug for FetchRefresh<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRefresh")
            .field("id", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_but_new_handles_do_not() {
        let (tx, _rx) = mpsc::unbounded_channel::<Command<u32>>();
        let a = FetchRefresh::new(tx.clone());
        let b = FetchRefresh::new(tx);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn refresh_after_disposal_yields_none() {
        let (tx, rx) = mpsc::unbounded_channel::<Command<u32>>();
        drop(rx);
        let refresh = FetchRefresh::new(tx);

        assert!(!refresh.trigger());
        assert_eq!(refresh.try_refresh().await, Ok(None));
    }

    #[test]
    fn tuple_order_is_data_loaded_error_refresh() {
        let (tx, _rx) = mpsc::unbounded_channel::<Command<&str>>();
        let refresh = FetchRefresh::new(tx);
        let state = FetchState::from_snapshot(
            Snapshot {
                data: "models",
                loaded: true,
                error: None,
            },
            refresh.clone(),
        );

        let (data, loaded, error, r) = state.into_tuple();
        assert_eq!(data, "models");
        assert!(loaded);
        assert!(error.is_none());
        assert_eq!(r, refresh);
    }
}
