//! # Cascading shutdown shared by `AppScope` and `Root`.
//!
//! ```text
//! cascade_safe(children, timeout)
//!   ├─► latch.add(N)
//!   ├─► spawn N waiters: child.shutdown(true) ─► DoneOnDrop ─► latch.done()
//!   └─► latch.wait_timeout(timeout)
//!          ├─ Ok       → stuck = sum of children's advisory stuck counts
//!          └─ Timeout  → child.shutdown(false) for every child not yet terminated
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::latch::{CompletionLatch, DoneOnDrop};

/// A child scope that can be shut down by its parent.
#[async_trait]
pub(crate) trait Child: Send + Sync + 'static {
    async fn shutdown_child(&self, safe: bool) -> Result<(), RuntimeError>;

    fn is_terminated(&self) -> bool;
}

/// Result of a safe cascade.
pub(crate) struct Cascade {
    /// Stragglers reported by children plus children forced on timeout.
    pub(crate) stuck: usize,
    /// `true` if the parent timeout elapsed and children were forced.
    pub(crate) escalated: bool,
}

/// Shuts every child down gracefully in parallel, forcing them if `timeout` elapses.
pub(crate) async fn cascade_safe<C: Child>(
    latch: &Arc<CompletionLatch>,
    children: &[Arc<C>],
    timeout: Duration,
) -> Cascade {
    let stuck = Arc::new(AtomicUsize::new(0));
    latch.add(children.len());

    for child in children {
        let guard = DoneOnDrop(Arc::clone(latch));
        let child = Arc::clone(child);
        let stuck = Arc::clone(&stuck);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(RuntimeError::ShutdownTimeout { stuck: n, .. }) =
                child.shutdown_child(true).await
            {
                stuck.fetch_add(n, Ordering::Relaxed);
            }
        });
    }

    if latch.wait_timeout(timeout).await {
        return Cascade {
            stuck: stuck.load(Ordering::Relaxed),
            escalated: false,
        };
    }

    let mut forced = 0;
    for child in children.iter().filter(|c| !c.is_terminated()) {
        forced += 1;
        let _ = child.shutdown_child(false).await;
    }
    Cascade {
        stuck: stuck.load(Ordering::Relaxed) + forced,
        escalated: true,
    }
}

/// Shuts every child down immediately.
pub(crate) async fn cascade_unsafe<C: Child>(children: &[Arc<C>]) {
    for child in children {
        let _ = child.shutdown_child(false).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scopes::state::{ScopeState, StateCell};

    /// Child whose graceful shutdown takes `drain` and reports `stragglers`.
    struct Slow {
        drain: Duration,
        stragglers: usize,
        state: StateCell,
    }

    impl Slow {
        fn new(drain: Duration, stragglers: usize) -> Arc<Self> {
            Arc::new(Self {
                drain,
                stragglers,
                state: StateCell::new(),
            })
        }
    }

    #[async_trait]
    impl Child for Slow {
        async fn shutdown_child(&self, safe: bool) -> Result<(), RuntimeError> {
            if safe {
                tokio::time::sleep(self.drain).await;
            }
            if self.state.advance(ScopeState::Terminated) == ScopeState::Terminated {
                return Ok(());
            }
            if safe && self.stragglers > 0 {
                return Err(RuntimeError::ShutdownTimeout {
                    scope: "slow".into(),
                    timeout: self.drain,
                    stuck: self.stragglers,
                });
            }
            Ok(())
        }

        fn is_terminated(&self) -> bool {
            self.state.is_terminated()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_children_done_in_time_do_not_escalate() {
        let latch = Arc::new(CompletionLatch::new());
        let children = vec![
            Slow::new(Duration::from_millis(10), 2),
            Slow::new(Duration::from_millis(20), 0),
        ];

        let res = cascade_safe(&latch, &children, Duration::from_millis(100)).await;
        assert!(!res.escalated);
        assert_eq!(res.stuck, 2);
        assert!(children.iter().all(|c| c.is_terminated()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_the_rest_and_counts_them() {
        let latch = Arc::new(CompletionLatch::new());
        let children = vec![
            Slow::new(Duration::from_millis(10), 2),
            Slow::new(Duration::from_secs(10), 0),
            Slow::new(Duration::from_secs(10), 0),
        ];

        let res = cascade_safe(&latch, &children, Duration::from_millis(100)).await;
        assert!(res.escalated);
        // Two stragglers reported by the first child, plus two forced children.
        assert_eq!(res.stuck, 4);
        assert!(children.iter().all(|c| c.is_terminated()));
    }
}
