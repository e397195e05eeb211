//! # Notification sink: the boundary towards the UI.
//!
//! The watcher never renders anything itself. Terminal outcomes carrying a notice are
//! turned into a [`Notification`] and handed to a [`Notify`] implementation, which is
//! expected to return quickly (queue, channel, toast store).
//!
//! [`ChannelNotifier`] forwards notifications into an unbounded tokio channel and is the
//! sink behind [`SessionBuilder::build_with_channel`](crate::SessionBuilder::build_with_channel);
//! [`LogNotifier`] is used when no sink is configured.

use tokio::sync::mpsc;

use crate::watch::outcome::{NotificationAction, Notice};
use crate::watch::task::WatchId;

/// Visual severity of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
}

/// Notification surfaced for a terminal watch outcome.
#[derive(Clone, Debug)]
pub struct Notification {
    /// Task that raised it.
    pub id: WatchId,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    pub(crate) fn from_notice(id: WatchId, severity: Severity, notice: Notice) -> Self {
        Self {
            id,
            severity,
            title: notice.title,
            message: notice.message,
            actions: notice.actions,
        }
    }
}

/// Receives notifications from the watcher's scheduling loop.
///
/// Called synchronously from the loop; must not block.
pub trait Notify: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// [`Notify`] implementation backed by an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end for the UI.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notify for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!(event = "watch.notifier_closed", "notification receiver dropped");
        }
    }
}

/// [`Notify`] implementation that only writes notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Error => {
                tracing::warn!(event = "watch.notification", watch = %n.id, title = %n.title, message = %n.message)
            }
            Severity::Success => {
                tracing::info!(event = "watch.notification", watch = %n.id, title = %n.title, message = %n.message)
            }
        }
    }
}

impl<F> Notify for F
where
    F: Fn(Notification) + Send + Sync + 'static,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_forwards_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notification::from_notice(WatchId(1), Severity::Error, Notice::new("X", "Y")));
        notifier.notify(Notification::from_notice(WatchId(2), Severity::Success, Notice::new("Done", "")));

        let first = rx.try_recv().expect("first");
        assert_eq!((first.id, first.severity, first.title.as_str()), (WatchId(1), Severity::Error, "X"));
        let second = rx.try_recv().expect("second");
        assert_eq!(second.severity, Severity::Success);
    }

    #[test]
    fn closures_are_notifiers() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |n: Notification| seen.lock().unwrap().push(n.title)
        };
        sink.notify(Notification::from_notice(WatchId(3), Severity::Error, Notice::new("T", "M")));
        assert_eq!(*seen.lock().unwrap(), vec!["T".to_string()]);
    }
}
