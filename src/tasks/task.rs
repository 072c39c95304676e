//! # Task record.
//!
//! A [`Task`] is the bookkeeping record of one spawned unit of work: identity, label,
//! cancellation token, completion signal and start time. It does not own the running
//! future and holds no reference back to its scope; the owning
//! [`LocalScope`](crate::LocalScope) map is the only place records are stored.
//!
//! `Task` is cheap to clone (a handful of `Arc`s); clones returned by queries are
//! snapshots of the same record and observe the same token and completion signal.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Globally unique task identifier (UUID v4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// One-shot completion signal.
///
/// Backed by a [`CancellationToken`] that is never linked to a parent, so it fires only
/// through [`DoneSignal::fire`].
#[derive(Clone, Debug, Default)]
pub(crate) struct DoneSignal(CancellationToken);

impl DoneSignal {
    pub(crate) fn fire(&self) {
        self.0.cancel();
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.0.is_cancelled()
    }

    pub(crate) async fn wait(&self) {
        self.0.cancelled().await
    }
}

/// Record of one tracked unit of concurrent work.
#[derive(Clone, Debug)]
pub struct Task {
    id: TaskId,
    label: Arc<str>,
    cohort: Option<Arc<str>>,
    scope: Arc<str>,
    token: CancellationToken,
    done: DoneSignal,
    started: Instant,
    started_at: SystemTime,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        label: Arc<str>,
        cohort: Option<Arc<str>>,
        scope: Arc<str>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            label,
            cohort,
            scope,
            token,
            done: DoneSignal::default(),
            started: Instant::now(),
            started_at: SystemTime::now(),
        }
    }

    /// Returns the task identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the caller-supplied label (not unique).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn label_arc(&self) -> &Arc<str> {
        &self.label
    }

    /// Returns the cohort (function group) this task was registered under, if any.
    pub fn cohort(&self) -> Option<&str> {
        self.cohort.as_deref()
    }

    pub(crate) fn cohort_arc(&self) -> Option<&Arc<str>> {
        self.cohort.as_ref()
    }

    /// Returns the `app/local` path of the owning scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns `true` if the task's label or cohort equals `label`.
    pub fn carries(&self, label: &str) -> bool {
        &*self.label == label || self.cohort.as_deref() == Some(label)
    }

    /// Returns the task's cancellation token.
    ///
    /// This is the same token the work function received.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancels the task's token.
    ///
    /// Cancellation is cooperative: the work function keeps running until it observes the
    /// token. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the work function has returned (or faulted).
    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }

    /// Waits until the work function has returned (or faulted).
    pub async fn finished(&self) {
        self.done.wait().await
    }

    pub(crate) fn signal_done(&self) {
        self.done.fire();
    }

    /// Time elapsed since spawn.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wall-clock spawn timestamp.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(label: &str, cohort: Option<&str>) -> Task {
        Task::new(
            TaskId::new(),
            label.into(),
            cohort.map(Into::into),
            "app/local".into(),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let a = task("x", None);
        let b = task("x", None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_carries_label_or_cohort() {
        let t = task("fetch", Some("ingest"));
        assert!(t.carries("fetch"));
        assert!(t.carries("ingest"));
        assert!(!t.carries("other"));
    }

    #[tokio::test]
    async fn test_clones_share_completion() {
        let t = task("x", None);
        let snapshot = t.clone();
        assert!(!snapshot.is_done());
        t.signal_done();
        snapshot.finished().await;
        assert!(snapshot.is_done());
    }
}
