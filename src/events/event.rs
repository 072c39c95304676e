//! # Runtime events emitted by the supervision tree.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Task events**: spawn, completion (with outcome and duration), timeout, cancel
//! - **Shutdown events**: request, per-cohort drain/force, grace exceeded, completion
//! - **Management events**: scope creation, config updates
//! - **Subscriber events**: overflow and panic of observability subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, scope path, task
//! label and id, outcome and elapsed time.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use scopevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ShutdownCompleted)
//!     .with_scope("billing/workers")
//!     .with_elapsed(Duration::from_millis(120))
//!     .with_stuck(2);
//!
//! assert_eq!(ev.kind, EventKind::ShutdownCompleted);
//! assert_eq!(ev.scope.as_deref(), Some("billing/workers"));
//! assert_eq!(ev.stuck, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::{Outcome, TaskId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Task events ===
    /// Task registered and launched.
    ///
    /// Sets:
    /// - `scope`: `app/local` path
    /// - `task`: label
    /// - `task_id`: id
    /// - `cohort`: cohort label, if any
    /// - `timeout_ms`: deadline, if any
    TaskSpawned,

    /// Task finished; cleanup steps follow immediately.
    ///
    /// Sets:
    /// - `scope`, `task`, `task_id`
    /// - `outcome`: how the work ended
    /// - `elapsed_ms`: run duration
    TaskCompleted,

    /// Task deadline elapsed and its token was cancelled.
    ///
    /// Sets:
    /// - `scope`, `task`, `task_id`
    /// - `timeout_ms`: configured deadline
    TimeoutHit,

    /// Task was cancelled and removed individually (`LocalScope::cancel_task`).
    ///
    /// Sets:
    /// - `scope`, `task`, `task_id`
    TaskCancelled,

    // === Shutdown events ===
    /// Shutdown of a scope (root, app, local) or cohort started.
    ///
    /// Sets:
    /// - `scope`: scope path (`root`, `app`, `app/local`)
    /// - `safe`: graceful (`true`) or immediate (`false`)
    /// - `task`: cohort label, for `shutdown_function`
    ShutdownRequested,

    /// Cohort drained within its timeout.
    ///
    /// Sets:
    /// - `scope`, `task` (cohort label), `elapsed_ms`
    CohortDrained,

    /// Cohort timed out; remaining members were cancelled and removed.
    ///
    /// Sets:
    /// - `scope`, `task` (cohort label), `elapsed_ms`, `stuck`
    CohortForced,

    /// Graceful wait of a scope exceeded its timeout; escalating to forced cancel.
    ///
    /// Sets:
    /// - `scope`, `timeout_ms`, `stuck`
    GraceExceeded,

    /// Shutdown of a scope finished (gracefully or after forcing).
    ///
    /// Sets:
    /// - `scope`, `safe`, `elapsed_ms`, `stuck` (forced count, `0` if none)
    ShutdownCompleted,

    // === Management events ===
    /// An app or local scope was created.
    ///
    /// Sets:
    /// - `scope`: path of the new scope
    ScopeCreated,

    /// Root configuration changed.
    ///
    /// Sets:
    /// - `reason`: the updated key
    ConfigUpdated,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Scope path (`root`, `app` or `app/local`).
    pub scope: Option<Arc<str>>,
    /// Task label, cohort label, or subscriber name.
    pub task: Option<Arc<str>>,
    /// Task id, if applicable.
    pub task_id: Option<TaskId>,
    /// Cohort label for spawn events.
    pub cohort: Option<Arc<str>>,
    /// Task outcome (only for `TaskCompleted`).
    pub outcome: Option<Outcome>,
    /// Elapsed time in milliseconds (compact).
    pub elapsed_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Number of tasks or scopes that had to be forced.
    pub stuck: Option<u32>,
    /// Graceful vs immediate shutdown.
    pub safe: Option<bool>,
    /// Human-readable reason (errors, overflow details, config key).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            scope: None,
            task: None,
            task_id: None,
            cohort: None,
            outcome: None,
            elapsed_ms: None,
            timeout_ms: None,
            stuck: None,
            safe: None,
            reason: None,
        }
    }

    /// Attaches a scope path.
    #[inline]
    pub fn with_scope(mut self, scope: impl Into<Arc<str>>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attaches a task (or cohort) label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a cohort label.
    #[inline]
    pub fn with_cohort(mut self, cohort: impl Into<Arc<str>>) -> Self {
        self.cohort = Some(cohort.into());
        self
    }

    /// Attaches a task outcome.
    #[inline]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a forced/straggler count.
    #[inline]
    pub fn with_stuck(mut self, n: usize) -> Self {
        self.stuck = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Marks a graceful (`true`) or immediate (`false`) shutdown.
    #[inline]
    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = Some(safe);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event; `dropped` is the subscriber's running total.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str, dropped: u64) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("queue {reason}, {dropped} dropped"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

#[inline]
fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskSpawned);
        let b = Event::new(EventKind::TaskSpawned);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_are_clamped() {
        let ev = Event::new(EventKind::GraceExceeded)
            .with_timeout(Duration::from_secs(u64::MAX / 2))
            .with_stuck(usize::MAX);
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
        assert_eq!(ev.stuck, Some(u32::MAX));
    }
}
