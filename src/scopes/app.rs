//! # AppScope: named group of local scopes.
//!
//! An [`AppScope`] owns its [`LocalScope`]s by name and derives their tokens from its own.
//! Shutdown cascades to every local scope in parallel (see [`cascade`](super::cascade)):
//!
//! ```text
//! shutdown(true):  snapshot locals ─► local.shutdown(true) × N in parallel
//!                    └─► parent latch wait (shutdown_timeout)
//!                          └─ timeout → local.shutdown(false) for the rest
//!                  ─► cancel app token ─► remove locals ─► Terminated
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{EntityKind, RuntimeError};
use crate::events::{Event, EventKind};
use crate::latch::CompletionLatch;
use crate::token;

use super::{Resolved, ScopeContext};
use super::cascade::{self, Child};
use super::local::LocalScope;
use super::state::{ScopeState, StateCell};

/// Named group of [`LocalScope`]s under a [`Root`](crate::Root).
#[derive(Debug)]
pub struct AppScope {
    name: Arc<str>,
    token: CancellationToken,
    locals: RwLock<HashMap<Arc<str>, Arc<LocalScope>>>,
    latch: Arc<CompletionLatch>,
    state: StateCell,
    ctx: ScopeContext,
}

impl AppScope {
    pub(crate) fn new(name: Arc<str>, parent: &CancellationToken, ctx: ScopeContext) -> Arc<Self> {
        let (token, _) = token::derive_child(parent);
        Arc::new(Self {
            name,
            token,
            locals: RwLock::new(HashMap::new()),
            latch: Arc::new(CompletionLatch::new()),
            state: StateCell::new(),
            ctx,
        })
    }

    /// App scope handed out by a closing root: cancelled, terminated and never registered.
    pub(crate) fn born_closed(
        name: Arc<str>,
        parent: &CancellationToken,
        ctx: ScopeContext,
    ) -> Arc<Self> {
        let app = Self::new(name, parent, ctx);
        app.token.cancel();
        app.state.advance(ScopeState::Terminated);
        app
    }

    /// Returns the app name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the app token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ScopeState {
        self.state.get()
    }

    /// Returns the local scope `name`, creating it on first reference.
    ///
    /// Repeated calls return the same instance. Once this app scope is closing (token
    /// cancelled or terminated), a missing name yields a terminated scope that rejects
    /// spawns and is not registered.
    pub fn local(&self, name: &str) -> Arc<LocalScope> {
        self.get_or_create(name).into_inner()
    }

    /// Returns the existing local scope `name`.
    pub fn get_local(&self, name: &str) -> Result<Arc<LocalScope>, RuntimeError> {
        self.locals
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found(EntityKind::Local, name))
    }

    /// Creates the local scope `name`.
    ///
    /// ### Errors
    /// - [`RuntimeError::AlreadyExists`] (informational) if it exists; use
    ///   [`local`](Self::local) or [`get_local`](Self::get_local) to reach it.
    /// - [`RuntimeError::Closed`] if this app scope is closing.
    pub fn create_local(&self, name: &str) -> Result<Arc<LocalScope>, RuntimeError> {
        match self.get_or_create(name) {
            Resolved::Created(local) => Ok(local),
            Resolved::Existing(_) => Err(RuntimeError::already_exists(EntityKind::Local, name)),
            Resolved::Closed(_) => Err(RuntimeError::Closed {
                scope: self.name.to_string(),
            }),
        }
    }

    /// Returns the sorted names of the local scopes.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locals.read().keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of live tasks across all local scopes.
    pub fn task_count(&self) -> usize {
        self.snapshot().iter().map(|l| l.task_count()).sum()
    }

    /// Shuts down and removes one local scope.
    pub async fn shutdown_local(&self, name: &str, safe: bool) -> Result<(), RuntimeError> {
        let local = self.get_local(name)?;
        let res = local.shutdown(safe).await;
        let mut locals = self.locals.write();
        if locals.get(name).is_some_and(|l| Arc::ptr_eq(l, &local)) {
            locals.remove(name);
        }
        res
    }

    /// Shuts down every local scope, then this app scope.
    ///
    /// ### Errors
    /// [`RuntimeError::ShutdownTimeout`] (advisory) if tasks or local scopes had to be
    /// forced. The shutdown has completed either way.
    pub async fn shutdown(&self, safe: bool) -> Result<(), RuntimeError> {
        if self.state.is_terminated() {
            return Ok(());
        }

        let start = Instant::now();
        let timeout = self.ctx.shutdown_timeout();
        self.ctx.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_scope(Arc::clone(&self.name))
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
                        .with_scope(Arc::clone(&self.name))
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
        let leftovers: Vec<Arc<LocalScope>> =
            self.locals.write().drain().map(|(_, l)| l).collect();
        cascade::cascade_unsafe(&leftovers).await;

        if self.state.advance(ScopeState::Terminated) == ScopeState::Terminated {
            return Ok(());
        }
        self.ctx.publish(
            Event::new(EventKind::ShutdownCompleted)
                .with_scope(Arc::clone(&self.name))
                .with_safe(safe)
                .with_elapsed(start.elapsed())
                .with_stuck(stuck),
        );

        if safe && stuck > 0 {
            return Err(RuntimeError::ShutdownTimeout {
                scope: self.name.to_string(),
                timeout,
                stuck,
            });
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<Arc<LocalScope>> {
        self.locals.read().values().cloned().collect()
    }

    fn get_or_create(&self, name: &str) -> Resolved<LocalScope> {
        if let Some(local) = self.locals.read().get(name).cloned() {
            return Resolved::Existing(local);
        }

        let local = {
            let mut locals = self.locals.write();
            if let Some(local) = locals.get(name) {
                return Resolved::Existing(Arc::clone(local));
            }
            // Checked under the lock: shutdown cancels the token before draining the map.
            if self.token.is_cancelled() || self.state.is_terminated() {
                let closed =
                    LocalScope::born_closed(&self.name, name.into(), &self.token, self.ctx.clone());
                return Resolved::Closed(closed);
            }
            let local = LocalScope::new(&self.name, name.into(), &self.token, self.ctx.clone());
            locals.insert(Arc::from(name), Arc::clone(&local));
            local
        };

        self.ctx
            .publish(Event::new(EventKind::ScopeCreated).with_scope(local.path()));
        Resolved::Created(local)
    }
}

#[async_trait]
impl Child for AppScope {
    async fn shutdown_child(&self, safe: bool) -> Result<(), RuntimeError> {
        self.shutdown(safe).await
    }

    fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::Bus;

    fn app() -> Arc<AppScope> {
        let ctx = ScopeContext::new(Bus::new(64), Config::default());
        AppScope::new("app".into(), &CancellationToken::new(), ctx)
    }

    #[test]
    fn test_local_is_idempotent() {
        let a = app();
        let l1 = a.local("workers");
        let l2 = a.local("workers");
        assert!(Arc::ptr_eq(&l1, &l2));
        assert_eq!(l1.path(), "app/workers");
        assert_eq!(a.local_names(), vec!["workers".to_string()]);
    }

    #[test]
    fn test_create_and_get_local() {
        let a = app();
        assert!(matches!(
            a.get_local("x"),
            Err(RuntimeError::NotFound {
                kind: EntityKind::Local,
                ..
            })
        ));
        let created = a.create_local("x").unwrap();
        let err = a.create_local("x").unwrap_err();
        assert!(err.is_advisory());
        assert!(Arc::ptr_eq(&created, &a.get_local("x").unwrap()));
    }

    #[test]
    fn test_app_cancel_reaches_locals_only_downwards() {
        let parent = CancellationToken::new();
        let ctx = ScopeContext::new(Bus::new(8), Config::default());
        let a = AppScope::new("app".into(), &parent, ctx);
        let l = a.local("l");

        a.token().cancel();
        assert!(l.token().is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_removes_locals() {
        let a = app();
        a.local("one");
        a.local("two");
        a.shutdown(true).await.unwrap();
        assert!(a.local_names().is_empty());
        assert_eq!(a.state(), ScopeState::Terminated);
        assert!(a.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_locals_after_shutdown_are_not_registered() {
        let a = app();
        a.shutdown(false).await.unwrap();

        for i in 0..50 {
            let late = a.local(&format!("late-{i}"));
            assert!(late.is_closed());
            assert_eq!(late.state(), ScopeState::Terminated);
        }
        assert!(a.local_names().is_empty());
        assert!(matches!(
            a.create_local("late-0"),
            Err(RuntimeError::Closed { scope }) if scope == "app"
        ));
        assert!(a.get_local("late-0").is_err());
    }
}
