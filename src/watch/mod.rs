//! Notification watcher: periodic condition checks that end in a notification.
//!
//! - [`task`]: what gets registered ([`WatchTask`], [`WatchCallback`], [`WatchFn`]);
//! - [`outcome`]: what a callback answers ([`WatchOutcome`], [`Notice`]);
//! - [`notify`]: where notifications go ([`Notify`], [`ChannelNotifier`]);
//! - [`registry`]: the scheduling loop (internal) and its query types;
//! - [`watcher`]: the public handle ([`NotificationWatcher`]).

pub mod notify;
pub mod outcome;
mod registry;
pub mod task;
pub mod watcher;

pub use notify::{ChannelNotifier, LogNotifier, Notification, Notify, Severity};
pub use outcome::{Notice, NotificationAction, WatchOutcome};
pub use registry::{WatchInfo, WatchStatus};
pub use task::{BoxWatchFuture, WatchCallback, WatchCallbackRef, WatchFn, WatchId, WatchTask};
pub use watcher::NotificationWatcher;
