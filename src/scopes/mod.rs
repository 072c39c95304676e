//! # Supervision hierarchy: root, app scopes, local scopes.
//!
//! ```text
//! Root ──┬── AppScope "billing" ──┬── LocalScope "workers" ──► Task, Task, …
//!        │                        └── LocalScope "cron"    ──► Task, …
//!        └── AppScope "api"     ──── LocalScope "http"    ──► Task, …
//! ```
//!
//! - Tokens: every scope token is a child of its parent's token, task tokens are
//!   children of the local scope token.
//! - Locks: every scope owns one `RwLock` over its own maps, held only for a single map
//!   operation. Iteration (shutdown, listing) works on snapshot copies.
//! - Shutdown: requests flow top-down; completion flows bottom-up through latches.
//!
//! Internal modules:
//! - [`local`]: leaf supervisor (spawn, queries, cohort drains, shutdown state machine);
//! - [`app`]: named group of local scopes with cascading shutdown;
//! - [`root`]: top-level supervisor, configuration and event fan-out;
//! - [`builder`]: `RootBuilder`;
//! - [`cascade`]: parallel child shutdown shared by app scopes and the root;
//! - [`state`]: forward-only lifecycle state.

mod app;
mod builder;
mod cascade;
mod local;
mod root;
mod state;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::Config;
use crate::events::{Bus, Event};

pub use app::AppScope;
pub use builder::RootBuilder;
pub use local::LocalScope;
pub use root::Root;
pub use state::ScopeState;

/// Handles shared by every scope of one tree.
#[derive(Clone, Debug)]
pub(crate) struct ScopeContext {
    pub(crate) bus: Bus,
    pub(crate) config: Arc<RwLock<Config>>,
}

impl ScopeContext {
    pub(crate) fn new(bus: Bus, config: Config) -> Self {
        Self {
            bus,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Current shutdown timeout (read at shutdown time, so updates apply to later shutdowns).
    pub(crate) fn shutdown_timeout(&self) -> Duration {
        self.config.read().shutdown_timeout
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }
}

/// Result of a name lookup that creates the child scope when missing.
pub(crate) enum Resolved<T> {
    Existing(Arc<T>),
    Created(Arc<T>),
    /// The parent is closing: a terminated child that was never registered.
    Closed(Arc<T>),
}

impl<T> Resolved<T> {
    pub(crate) fn into_inner(self) -> Arc<T> {
        match self {
            Resolved::Existing(s) | Resolved::Created(s) | Resolved::Closed(s) => s,
        }
    }
}
