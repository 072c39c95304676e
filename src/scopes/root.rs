//! # Root: top-level supervisor.
//!
//! The [`Root`] owns the app scopes, the process-level cancellation token, the shared
//! [`Config`] and the event bus. When built with subscribers it also runs the listener that
//! forwards bus events to the [`SubscriberSet`].
//!
//! ## Architecture
//! ```text
//! RootBuilder::build()
//!   ├─► Bus (broadcast) ─────────────────────────┐
//!   ├─► root token (child of parent token, if any)│
//!   └─► Listener: Bus.subscribe() ─► SubscriberSet::emit()
//!
//! Root::app(name) ──► AppScope ──► LocalScope ──► spawn(...)
//!
//! Root::shutdown(safe)
//!   ├─► publish ShutdownRequested { scope: "root" }
//!   ├─► cascade to every AppScope (safe: parallel + timeout, unsafe: direct)
//!   ├─► cancel root token ─► remove apps ─► Terminated
//!   ├─► publish ShutdownCompleted
//!   └─► stop listener: forward pending events, drain subscriber queues
//!         (safe: ≤ shutdown_timeout, unsafe: ≤ 100ms), abort what is still busy
//! ```
//!
//! A terminated root stays terminated; build a new one to start over.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigValue};
use crate::error::{EntityKind, RuntimeError};
use crate::events::{Event, EventKind};
use crate::latch::CompletionLatch;
use crate::subscribers::{SubscriberDrops, SubscriberSet};

use super::{Resolved, ScopeContext};
use super::app::AppScope;
use super::builder::RootBuilder;
use super::cascade;
use super::state::{ScopeState, StateCell};

const ROOT_SCOPE: &str = "root";

/// Subscriber drain budget on a forced shutdown.
const FORCED_SUBSCRIBER_GRACE: Duration = Duration::from_millis(100);

/// Extra wait for the listener task itself on top of the subscriber grace.
const LISTENER_STOP_SLACK: Duration = Duration::from_millis(100);

/// Forwards bus events to the subscriber set until stopped.
///
/// Dropping the listener without [`stop`](Self::stop) also ends it, with no drain grace.
pub(crate) struct Listener {
    stop: oneshot::Sender<Duration>,
    handle: JoinHandle<()>,
}

impl Listener {
    pub(crate) fn spawn(mut rx: broadcast::Receiver<Event>, set: SubscriberSet) -> Self {
        let (stop, mut stopped) = oneshot::channel::<Duration>();

        let handle = tokio::spawn(async move {
            let grace = loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(Arc::new(ev)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event listener lagged");
                        }
                        Err(RecvError::Closed) => break Duration::ZERO,
                    },
                    grace = &mut stopped => break grace.unwrap_or(Duration::ZERO),
                }
            };
            let aborted = set.shutdown(grace).await;
            if aborted > 0 {
                tracing::warn!(aborted, ?grace, "subscribers aborted at root shutdown");
            }
        });

        Self { stop, handle }
    }

    /// Stops forwarding and gives subscribers `grace` to drain their queues.
    async fn stop(self, grace: Duration) {
        let Self { stop, mut handle } = self;
        let _ = stop.send(grace);
        if tokio::time::timeout(grace + LISTENER_STOP_SLACK, &mut handle)
            .await
            .is_err()
        {
            tracing::warn!(?grace, "event listener did not stop in time, aborting");
            handle.abort();
        }
    }
}

/// Top-level supervisor owning named [`AppScope`]s.
///
/// ## Example
/// ```rust
/// use scopevisor::{Config, Root};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = Root::new(Config::default());
/// let a = root.app("billing");
/// assert!(std::sync::Arc::ptr_eq(&a, &root.app("billing")));
///
/// root.shutdown(true).await?;
/// assert!(root.is_terminated());
/// # Ok(())
/// # }
/// ```
pub struct Root {
    token: CancellationToken,
    apps: RwLock<HashMap<Arc<str>, Arc<AppScope>>>,
    latch: Arc<CompletionLatch>,
    state: StateCell,
    ctx: ScopeContext,
    listener: Mutex<Option<Listener>>,
    drops: SubscriberDrops,
}

impl Root {
    /// Creates a root without subscribers. Does not require a runtime.
    pub fn new(cfg: Config) -> Arc<Self> {
        RootBuilder::new(cfg).build()
    }

    /// Returns a [`RootBuilder`] for subscribers or a parent token.
    pub fn builder(cfg: Config) -> RootBuilder {
        RootBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        ctx: ScopeContext,
        token: CancellationToken,
        listener: Option<Listener>,
        drops: SubscriberDrops,
    ) -> Arc<Self> {
        Arc::new(Self {
            token,
            apps: RwLock::new(HashMap::new()),
            latch: Arc::new(CompletionLatch::new()),
            state: StateCell::new(),
            ctx,
            listener: Mutex::new(listener),
            drops,
        })
    }

    /// Returns the root token; every scope token derives from it.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ScopeState {
        self.state.get()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has completed.
    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    /// Subscribes directly to the event bus.
    ///
    /// The receiver only sees events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.ctx.bus.subscribe()
    }

    /// Returns `(subscriber name, events dropped on a full queue)` per subscriber.
    ///
    /// Counters keep their final values after shutdown.
    pub fn subscriber_drops(&self) -> Vec<(&'static str, u64)> {
        self.drops.snapshot()
    }

    // ---------------------------
    // App scopes
    // ---------------------------

    /// Returns the app scope `name`, creating it on first reference.
    ///
    /// Once the root is closing, a missing name yields a terminated app scope that is not
    /// registered.
    pub fn app(&self, name: &str) -> Arc<AppScope> {
        self.get_or_create(name).into_inner()
    }

    /// Returns the existing app scope `name`.
    pub fn get_app(&self, name: &str) -> Result<Arc<AppScope>, RuntimeError> {
        self.apps
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found(EntityKind::App, name))
    }

    /// Creates the app scope `name`.
    ///
    /// ### Errors
    /// [`RuntimeError::AlreadyExists`] if present, [`RuntimeError::Closed`] once the root
    /// is closing.
    pub fn create_app(&self, name: &str) -> Result<Arc<AppScope>, RuntimeError> {
        match self.get_or_create(name) {
            Resolved::Created(app) => Ok(app),
            Resolved::Existing(_) => Err(RuntimeError::already_exists(EntityKind::App, name)),
            Resolved::Closed(_) => Err(RuntimeError::Closed {
                scope: ROOT_SCOPE.to_string(),
            }),
        }
    }

    /// Returns the sorted app names.
    pub fn app_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.apps.read().keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of live tasks across the whole tree.
    pub fn task_count(&self) -> usize {
        self.snapshot().iter().map(|a| a.task_count()).sum()
    }

    /// Shuts down and removes one app scope.
    pub async fn shutdown_app(&self, name: &str, safe: bool) -> Result<(), RuntimeError> {
        let app = self.get_app(name)?;
        let res = app.shutdown(safe).await;
        let mut apps = self.apps.write();
        if apps.get(name).is_some_and(|a| Arc::ptr_eq(a, &app)) {
            apps.remove(name);
        }
        res
    }

    // ---------------------------
    // Configuration
    // ---------------------------

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> Config {
        self.ctx.config.read().clone()
    }

    /// Updates one configuration key.
    ///
    /// A new `shutdown_timeout` applies to shutdowns started afterwards.
    ///
    /// ## Example
    /// ```rust
    /// use std::time::Duration;
    /// use scopevisor::{Config, ConfigValue, Root, RuntimeError};
    ///
    /// let root = Root::new(Config::default());
    /// root.update_config("shutdown_timeout", ConfigValue::Duration(Duration::from_secs(2)))?;
    /// assert_eq!(root.config().shutdown_timeout, Duration::from_secs(2));
    ///
    /// let err = root.update_config("max_tasks", ConfigValue::Bool(true)).unwrap_err();
    /// assert_eq!(err.as_label(), "runtime_configuration");
    /// # Ok::<(), RuntimeError>(())
    /// ```
    pub fn update_config(&self, key: &str, value: ConfigValue) -> Result<(), RuntimeError> {
        self.ctx.config.write().update(key, value)?;
        self.ctx.publish(
            Event::new(EventKind::ConfigUpdated)
                .with_scope(ROOT_SCOPE)
                .with_reason(key),
        );
        Ok(())
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Shuts the whole tree down and marks this root terminated.
    ///
    /// See [`LocalScope::shutdown`](crate::LocalScope::shutdown) for the per-scope
    /// protocol. Calling it again is a no-op.
    ///
    /// ### Errors
    /// [`RuntimeError::ShutdownTimeout`] (advisory) if anything had to be forced.
    pub async fn shutdown(&self, safe: bool) -> Result<(), RuntimeError> {
        if self.state.is_terminated() {
            return Ok(());
        }

        let start = Instant::now();
        let timeout = self.ctx.shutdown_timeout();
        self.ctx.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_scope(ROOT_SCOPE)
                .with_safe(safe),
        );

        let children = self.snapshot();
        let stuck = if safe {
            self.state.advance(ScopeState::GracefulDraining);
            let res = cascade::cascade_safe(&self.latch, &children, timeout).await;
            if res.escalated {
                self.state.advance(ScopeState::ForcedCancel);
                self.ctx.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_scope(ROOT_SCOPE)
                        .with_timeout(timeout)
                        .with_stuck(res.stuck),
                );
            }
            res.stuck
        } else {
            self.state.advance(ScopeState::ForcedCancel);
            cascade::cascade_unsafe(&children).await;
            0
        };

        self.token.cancel();
        let leftovers: Vec<Arc<AppScope>> = self.apps.write().drain().map(|(_, a)| a).collect();
        cascade::cascade_unsafe(&leftovers).await;

        if self.state.advance(ScopeState::Terminated) == ScopeState::Terminated {
            return Ok(());
        }
        self.ctx.publish(
            Event::new(EventKind::ShutdownCompleted)
                .with_scope(ROOT_SCOPE)
                .with_safe(safe)
                .with_elapsed(start.elapsed())
                .with_stuck(stuck),
        );

        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            let grace = if safe { timeout } else { FORCED_SUBSCRIBER_GRACE };
            listener.stop(grace).await;
        }

        if safe && stuck > 0 {
            return Err(RuntimeError::ShutdownTimeout {
                scope: ROOT_SCOPE.to_string(),
                timeout,
                stuck,
            });
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<Arc<AppScope>> {
        self.apps.read().values().cloned().collect()
    }

    fn get_or_create(&self, name: &str) -> Resolved<AppScope> {
        if let Some(app) = self.apps.read().get(name).cloned() {
            return Resolved::Existing(app);
        }

        let app = {
            let mut apps = self.apps.write();
            if let Some(app) = apps.get(name) {
                return Resolved::Existing(Arc::clone(app));
            }
            if self.token.is_cancelled() || self.state.is_terminated() {
                let closed = AppScope::born_closed(name.into(), &self.token, self.ctx.clone());
                return Resolved::Closed(closed);
            }
            let app = AppScope::new(name.into(), &self.token, self.ctx.clone());
            apps.insert(Arc::from(name), Arc::clone(&app));
            app
        };

        self.ctx
            .publish(Event::new(EventKind::ScopeCreated).with_scope(app.name()));
        Resolved::Created(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_app_is_idempotent() {
        let root = Root::new(Config::default());
        let a = root.app("x");
        assert!(Arc::ptr_eq(&a, &root.app("x")));
        assert_eq!(root.app_names(), vec!["x".to_string()]);
        assert!(root.create_app("x").unwrap_err().is_advisory());
        assert!(root.get_app("y").is_err());
    }

    #[test]
    fn test_parent_token_cascades() {
        let parent = CancellationToken::new();
        let root = RootBuilder::new(Config::default())
            .with_parent_token(parent.clone())
            .build();
        let local = root.app("a").local("l");

        parent.cancel();
        assert!(root.token().is_cancelled());
        assert!(local.is_closed());
    }

    #[tokio::test]
    async fn test_update_config_publishes_event() {
        let root = Root::new(Config::default());
        let mut rx = root.events();

        root.update_config("max_tasks", ConfigValue::Int(8)).unwrap();
        assert_eq!(root.config().max_tasks, Some(8));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ConfigUpdated);
        assert_eq!(ev.reason.as_deref(), Some("max_tasks"));
    }

    #[tokio::test]
    async fn test_shutdown_is_terminal_and_idempotent() {
        let root = Root::new(Config {
            shutdown_timeout: Duration::from_millis(200),
            ..Config::default()
        });
        root.app("a").local("l");

        root.shutdown(true).await.unwrap();
        assert!(root.is_terminated());
        assert!(root.app_names().is_empty());
        root.shutdown(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_apps_after_shutdown_are_not_registered() {
        let root = Root::new(Config::default());
        let mut rx = root.events();
        root.shutdown(false).await.unwrap();
        while rx.try_recv().is_ok() {}

        for i in 0..50 {
            let late = root.app(&format!("late-{i}"));
            assert_eq!(late.state(), ScopeState::Terminated);
            assert!(late.local("l").is_closed());
        }
        assert!(root.app_names().is_empty());
        assert!(matches!(
            root.create_app("late-0"),
            Err(RuntimeError::Closed { scope }) if scope == "root"
        ));
        assert!(rx.try_recv().is_err(), "no ScopeCreated for unregistered apps");
    }

    #[tokio::test]
    async fn test_subscriber_drops_empty_without_subscribers() {
        let root = Root::new(Config::default());
        assert!(root.subscriber_drops().is_empty());
    }
}
