use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    watch::{ChannelNotifier, LogNotifier, Notification, NotificationWatcher, Notify},
};
use super::session::Session;

/// Builder for constructing a [`Session`] with optional features.
pub struct SessionBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    notifier: Option<Arc<dyn Notify>>,
}

impl SessionBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            notifier: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (fetch invocations, watch attempts, teardown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets where watch notifications are delivered.
    ///
    /// Without a notifier, notifications are only written to the log.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notify>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Builds the session, delivering notifications into a channel.
    ///
    /// Replaces any notifier set with [`with_notifier`](Self::with_notifier).
    pub fn build_with_channel(mut self) -> (Session, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        self.notifier = Some(Arc::new(notifier));
        (self.build(), rx)
    }

    /// Builds and returns the Session instance.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Event bus for broadcasting
    /// - Subscriber workers and the bus listener feeding them
    /// - Notification watcher and its registry loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Session {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier));
        let watcher = NotificationWatcher::with_lifetime(
            notifier,
            bus.clone(),
            &self.cfg,
            runtime_token.child_token(),
        );

        Session::new_internal(self.cfg, bus, subs, watcher, runtime_token)
    }
}
