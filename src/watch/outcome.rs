//! # Watch outcomes and the notices they carry.
//!
//! A watch callback answers every attempt with a [`WatchOutcome`]:
//!
//! | Outcome            | Registry reaction                                   |
//! |--------------------|-----------------------------------------------------|
//! | `Repoll`           | next attempt after the task interval                |
//! | `Stop`             | task removed, nothing surfaced                      |
//! | `Error(notice)`    | error notification surfaced, task removed           |
//! | `Success(notice)`  | success notification surfaced, task removed         |

use std::fmt;
use std::sync::Arc;

/// Result of one watch attempt.
#[derive(Clone, Debug)]
pub enum WatchOutcome {
    /// Condition not met yet; check again later.
    Repoll,
    /// Condition resolved silently.
    Stop,
    /// Condition resolved with a failure the user must see.
    Error(Notice),
    /// Condition resolved with a success the user should see.
    Success(Notice),
}

impl WatchOutcome {
    /// Shorthand for `Error(Notice::new(title, message))`.
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        WatchOutcome::Error(Notice::new(title, message))
    }

    /// Shorthand for `Success(Notice::new(title, message))`.
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        WatchOutcome::Success(Notice::new(title, message))
    }

    /// True for outcomes that end the task.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchOutcome::Repoll)
    }

    /// Stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchOutcome::Repoll => "repoll",
            WatchOutcome::Stop => "stop",
            WatchOutcome::Error(_) => "error",
            WatchOutcome::Success(_) => "success",
        }
    }
}

/// Title, message and actions of a notification.
#[derive(Clone, Debug, Default)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            actions: Vec::new(),
        }
    }

    /// Appends an action button.
    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Clickable action attached to a notification; surfaced verbatim.
#[derive(Clone)]
pub struct NotificationAction {
    pub title: String,
    pub on_click: Arc<dyn Fn() + Send + Sync>,
}

impl NotificationAction {
    pub fn new<F>(title: impl Into<String>, on_click: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            on_click: Arc::new(on_click),
        }
    }

    /// Runs the click handler.
    pub fn click(&self) {
        (self.on_click)()
    }
}

impl fmt::Debug for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationAction")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn only_repoll_keeps_the_task() {
        assert!(!WatchOutcome::Repoll.is_terminal());
        assert!(WatchOutcome::Stop.is_terminal());
        assert!(WatchOutcome::error("X", "Y").is_terminal());
        assert_eq!(WatchOutcome::success("Done", "").as_label(), "success");
    }

    #[test]
    fn actions_are_kept_verbatim() {
        let clicks = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&clicks);
        let notice = Notice::new("Deployment failed", "image pull backoff")
            .with_action(NotificationAction::new("View logs", move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));

        assert_eq!(notice.actions.len(), 1);
        assert_eq!(notice.actions[0].title, "View logs");
        notice.actions[0].click();
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert!(format!("{:?}", notice.actions[0]).contains("View logs"));
    }
}
