use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberDrops, SubscriberSet};
use crate::token;

use super::ScopeContext;
use super::root::{Listener, Root};

/// Builder for constructing a [`Root`] with optional features.
pub struct RootBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    parent: Option<CancellationToken>,
}

impl RootBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            parent: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (spawn, completion, shutdown, config)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Derives the root token from `parent`.
    ///
    /// Cancelling `parent` (e.g. from an OS signal handler owned by the application)
    /// cancels every scope and task of the tree. It does not run a shutdown: call
    /// [`Root::shutdown`] for the drain protocol.
    pub fn with_parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds the root.
    ///
    /// With subscribers, spawns the listener that forwards bus events to them, so it must
    /// then be called from within a tokio runtime. Without subscribers no task is spawned.
    pub fn build(self) -> Arc<Root> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = match &self.parent {
            Some(parent) => token::derive_child(parent).0,
            None => CancellationToken::new(),
        };

        let (listener, drops) = if self.subscribers.is_empty() {
            (None, SubscriberDrops::default())
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            let drops = set.drops();
            (Some(Listener::spawn(bus.subscribe(), set)), drops)
        };

        Root::new_internal(ScopeContext::new(bus, self.cfg), token, listener, drops)
    }
}
