//! # Run a single guarded attempt.
//!
//! Shared by fetch drivers and the watch loop. One attempt is one future produced
//! by user code (a producer invocation or a watch callback). The runner:
//!
//! - **Races cancellation**: the attempt future is dropped as soon as its token is cancelled,
//!   which aborts any outstanding I/O it owns.
//! - **Isolates panics**: a panicking attempt settles as [`Settled::Panicked`] instead of
//!   unwinding into the scheduling loop.
//!
//! ## Flow
//! ```text
//! run_guarded(token, fut)
//!   ├─ token cancelled first  → Settled::Canceled   (fut dropped)
//!   ├─ fut completes          → Settled::Completed(output)
//!   └─ fut panics             → Settled::Panicked(message)
//! ```
//!
//! ## Rules
//! - Cancellation is checked **before** polling the attempt (biased select).
//! - The caller owns the token; derive a **child token** per attempt so that cancelling
//!   one attempt never affects its parent.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

/// How one attempt settled.
#[derive(Debug)]
pub(crate) enum Settled<R> {
    /// The attempt ran to completion.
    Completed(R),
    /// The token was cancelled before the attempt completed.
    Canceled,
    /// The attempt panicked; carries the panic message.
    Panicked(String),
}

/// Drives `fut` until it completes, panics, or `token` is cancelled.
pub(crate) async fn run_guarded<F>(token: &CancellationToken, fut: F) -> Settled<F::Output>
where
    F: Future,
{
    let guarded = AssertUnwindSafe(fut).catch_unwind();
    tokio::select! {
        biased;
        _ = token.cancelled() => Settled::Canceled,
        res = guarded => match res {
            Ok(out) => Settled::Completed(out),
            Err(payload) => Settled::Panicked(panic_message(&*payload)),
        },
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
