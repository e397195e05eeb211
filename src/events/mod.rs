//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by fetch engines, the notification
//! watcher, the session and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: fetch drivers, the watch registry loop, `Session`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the session bus listener (fans out to `SubscriberSet`).
//!
//! Stale results are **never** published: a discarded invocation leaves no trace.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
