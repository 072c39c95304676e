//! # LocalScope: leaf supervisor of tasks and function groups.
//!
//! A [`LocalScope`] owns:
//! - a task map (`TaskId → Task`), the only owner of task records;
//! - a function-group map (`label → CompletionLatch`) for cohort waits and drains;
//! - a cancellation token derived from its app scope;
//! - a completion latch counting every running work function;
//! - an atomic task counter mirroring the task map size for lock-free reads.
//!
//! ## Spawn and completion
//! ```text
//! spawn(label, work, opts)
//!   ├─► derive task token (with deadline if opts.timeout)
//!   ├─► [write lock] insert task, counter += 1, latch.add(1), cohort.add(1)
//!   ├─► publish TaskSpawned
//!   └─► tokio::spawn(run_task) ──► work(token) (catch_unwind if fault recovery)
//!                                     │
//!                   CompletionGuard::drop (always runs, even on unwind/abort)
//!                     ├─► publish TaskCompleted { outcome, elapsed }
//!                     ├─► cohort.done()
//!                     ├─► latch.done()
//!                     ├─► signal completion
//!                     ├─► cancel task token
//!                     └─► [write lock] remove task, counter -= 1 (if still present)
//! ```
//!
//! ## Shutdown
//! ```text
//! shutdown(true):  Running ─► GracefulDraining
//!                    ├─► snapshot tasks, collect labels (label + cohort)
//!                    ├─► drain every label concurrently:
//!                    │     cancel carriers ─► wait group + carriers (timeout)
//!                    │       ├─ drained  → CohortDrained
//!                    │       └─ timeout  → cancel+remove carriers → CohortForced
//!                    ├─► latch.wait_timeout(shutdown_timeout)
//!                    │       └─ timeout  → ForcedCancel: cancel+remove all → GraceExceeded
//!                    └─► cancel scope token ─► sweep late spawns ─► Terminated
//!
//! shutdown(false): Running ─► ForcedCancel ─► cancel+remove all ─► cancel token ─► sweep ─► Terminated
//! ```
//!
//! ## Rules
//! - The lock is held for one map operation at a time, never across a wait or a call into
//!   task code; shutdown and listing iterate over snapshot copies.
//! - The scope latch is incremented under the same lock that inserts the task, and spawn
//!   re-checks the scope token under that lock, so a task spawned during shutdown is either
//!   awaited or caught by the final sweep.
//! - Every latch increment has exactly one decrement, performed by the task's own
//!   completion guard. Forced removal never touches latches.
//! - Cancellation is cooperative: a removed task whose work ignores its token keeps
//!   running (and keeps its latch count) until it returns.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{EntityKind, RuntimeError, TaskError};
use crate::events::{Event, EventKind};
use crate::latch::CompletionLatch;
use crate::tasks::{Outcome, SpawnOptions, Task, TaskId};
use crate::token;

use super::ScopeContext;
use super::cascade::Child;
use super::state::{ScopeState, StateCell};

/// Maps guarded by the scope's single lock.
#[derive(Debug, Default)]
struct Maps {
    tasks: HashMap<TaskId, Task>,
    groups: HashMap<Arc<str>, Arc<CompletionLatch>>,
}

/// Leaf supervisor: owns tasks and function groups.
///
/// Obtained through [`AppScope::local`](crate::AppScope::local); always handled as
/// `Arc<LocalScope>`.
#[derive(Debug)]
pub struct LocalScope {
    name: Arc<str>,
    path: Arc<str>,
    token: CancellationToken,
    maps: RwLock<Maps>,
    count: AtomicIsize,
    latch: CompletionLatch,
    state: StateCell,
    ctx: ScopeContext,
}

impl LocalScope {
    pub(crate) fn new(
        app: &str,
        name: Arc<str>,
        parent: &CancellationToken,
        ctx: ScopeContext,
    ) -> Arc<Self> {
        let (token, _) = token::derive_child(parent);
        Arc::new(Self {
            path: format!("{app}/{name}").into(),
            name,
            token,
            maps: RwLock::new(Maps::default()),
            count: AtomicIsize::new(0),
            latch: CompletionLatch::new(),
            state: StateCell::new(),
            ctx,
        })
    }

    /// Scope handed out by a closing app scope: cancelled, terminated and never registered.
    pub(crate) fn born_closed(
        app: &str,
        name: Arc<str>,
        parent: &CancellationToken,
        ctx: ScopeContext,
    ) -> Arc<Self> {
        let scope = Self::new(app, name, parent, ctx);
        scope.token.cancel();
        scope.state.advance(ScopeState::Terminated);
        scope
    }

    /// Returns the scope name (unique within its app scope).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the `app/local` path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the scope token; task tokens are derived from it.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ScopeState {
        self.state.get()
    }

    /// Returns `true` once the scope no longer accepts tasks.
    pub fn is_closed(&self) -> bool {
        self.state.is_terminated() || self.token.is_cancelled()
    }

    /// Number of work functions still running, including ones already force-removed from
    /// the task map that have not returned yet.
    pub fn pending(&self) -> usize {
        self.latch.count()
    }

    // ---------------------------
    // Spawn
    // ---------------------------

    /// Spawns `work` as a tracked task labelled `label`.
    ///
    /// The work function receives the task's [`CancellationToken`] and is expected to
    /// observe it: cancellation (explicit, deadline, or shutdown) never preempts running
    /// code.
    ///
    /// The configured `max_tasks` is **not** enforced here. Whether a limit should reject,
    /// block, or only warn is unresolved, so spawning ignores it.
    ///
    /// ### Errors
    /// [`RuntimeError::Closed`] if the scope has terminated or its token was cancelled.
    ///
    /// ### Panics
    /// Must be called from within a tokio runtime.
    ///
    /// ## Example
    /// ```rust
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    /// use scopevisor::{Config, Root, SpawnOptions, TaskError};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let root = Root::new(Config::default());
    /// let scope = root.app("billing").local("workers");
    ///
    /// let id = scope.spawn(
    ///     "invoice",
    ///     |ctx: CancellationToken| async move {
    ///         tokio::select! {
    ///             _ = ctx.cancelled() => Err(TaskError::Canceled),
    ///             _ = tokio::time::sleep(Duration::from_millis(10)) => Ok(()),
    ///         }
    ///     },
    ///     SpawnOptions::new().with_cohort("invoices"),
    /// )?;
    ///
    /// assert!(scope.get_task(id).is_ok());
    /// scope.wait_for_function("invoices").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<F, Fut>(
        self: &Arc<Self>,
        label: impl Into<Arc<str>>,
        work: F,
        opts: SpawnOptions,
    ) -> Result<TaskId, RuntimeError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let label: Arc<str> = label.into();
        let id = TaskId::new();

        let (task_token, _) = match opts.timeout() {
            Some(timeout) => {
                let bus = self.ctx.bus.clone();
                let path = Arc::clone(&self.path);
                let label = Arc::clone(&label);
                token::derive_child_with_deadline_hook(&self.token, timeout, move || {
                    bus.publish(
                        Event::new(EventKind::TimeoutHit)
                            .with_scope(path)
                            .with_task(label)
                            .with_task_id(id)
                            .with_timeout(timeout),
                    );
                })
            }
            None => token::derive_child(&self.token),
        };

        let task = Task::new(
            id,
            Arc::clone(&label),
            opts.cohort_arc(),
            Arc::clone(&self.path),
            task_token.clone(),
        );

        let cohort = {
            let mut maps = self.maps.write();
            if self.is_closed() {
                drop(maps);
                task.cancel();
                return Err(self.closed_error());
            }
            maps.tasks.insert(id, task.clone());
            self.count.fetch_add(1, Ordering::AcqRel);
            self.latch.add(1);
            opts.cohort_arc().map(|c| {
                let group = Arc::clone(maps.groups.entry(c).or_default());
                group.add(1);
                group
            })
        };

        let mut ev = Event::new(EventKind::TaskSpawned)
            .with_scope(Arc::clone(&self.path))
            .with_task(label)
            .with_task_id(id);
        if let Some(c) = opts.cohort_arc() {
            ev = ev.with_cohort(c);
        }
        if let Some(t) = opts.timeout() {
            ev = ev.with_timeout(t);
        }
        self.ctx.publish(ev);

        let guard = CompletionGuard {
            scope: Arc::clone(self),
            task,
            cohort,
            started: Instant::now(),
            outcome: None,
        };
        tokio::spawn(run_task(
            guard,
            async move { work(task_token).await },
            opts.fault_recovery(),
        ));
        Ok(id)
    }

    /// Guaranteed cleanup of a finished task. Called exactly once per task, from its guard.
    fn complete(
        &self,
        task: &Task,
        cohort: Option<Arc<CompletionLatch>>,
        outcome: Outcome,
        elapsed: Duration,
    ) {
        self.ctx.publish(
            Event::new(EventKind::TaskCompleted)
                .with_scope(Arc::clone(&self.path))
                .with_task(Arc::clone(task.label_arc()))
                .with_task_id(task.id())
                .with_outcome(outcome)
                .with_elapsed(elapsed),
        );
        if let Some(group) = cohort {
            group.done();
        }
        self.latch.done();
        task.signal_done();
        task.cancel();
        self.remove_entry(task.id());
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// Returns a snapshot of the task with `id`.
    pub fn get_task(&self, id: TaskId) -> Result<Task, RuntimeError> {
        self.maps
            .read()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found(EntityKind::Task, id.to_string()))
    }

    /// Returns a snapshot copy of all live tasks (not a live view).
    pub fn list_tasks(&self) -> Vec<Task> {
        self.maps.read().tasks.values().cloned().collect()
    }

    /// Returns the number of live tasks without taking the lock.
    ///
    /// Falls back to counting the map if the counter is ever found negative.
    pub fn task_count(&self) -> usize {
        let n = self.count.load(Ordering::Acquire);
        if n >= 0 {
            return n as usize;
        }

        let maps = self.maps.read();
        let real = maps.tasks.len();
        self.count.store(real as isize, Ordering::Release);
        tracing::warn!(scope = %self.path, counter = n, real, "task counter recomputed");
        real
    }

    /// Returns whether the task's work function has returned.
    ///
    /// A finished task leaves the map shortly after completing, after which this returns
    /// `NotFound`; hold the [`Task`] from [`get_task`](Self::get_task) to keep observing it.
    pub fn is_task_done(&self, id: TaskId) -> Result<bool, RuntimeError> {
        self.get_task(id).map(|t| t.is_done())
    }

    /// Returns the time since the task was spawned.
    pub fn task_uptime(&self, id: TaskId) -> Result<Duration, RuntimeError> {
        self.get_task(id).map(|t| t.uptime())
    }

    /// Cancels the task's token and removes it from the scope.
    ///
    /// The work function keeps running until it observes the token; its completion still
    /// releases the scope and cohort latches.
    pub fn cancel_task(&self, id: TaskId) -> Result<(), RuntimeError> {
        let task = self.get_task(id)?;
        task.cancel();
        if self.remove_entry(id).is_none() {
            return Err(RuntimeError::not_found(EntityKind::Task, id.to_string()));
        }
        self.ctx.publish(
            Event::new(EventKind::TaskCancelled)
                .with_scope(Arc::clone(&self.path))
                .with_task(Arc::clone(task.label_arc()))
                .with_task_id(id),
        );
        Ok(())
    }

    /// Returns the sorted labels of live function groups.
    pub fn list_function_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .maps
            .read()
            .groups
            .keys()
            .map(|k| k.to_string())
            .collect();
        labels.sort_unstable();
        labels
    }

    /// Returns how many carriers of the function group `label` are still running.
    ///
    /// ### Errors
    /// [`RuntimeError::NotFound`] with [`EntityKind::FunctionGroup`] if no cohort of that
    /// name was spawned, or once the group was drained by a wait, a
    /// [`shutdown_function`](Self::shutdown_function) or the scope shutdown.
    pub fn function_pending(&self, label: &str) -> Result<usize, RuntimeError> {
        self.maps
            .read()
            .groups
            .get(label)
            .map(|g| g.count())
            .ok_or_else(|| RuntimeError::not_found(EntityKind::FunctionGroup, label))
    }

    // ---------------------------
    // Function groups
    // ---------------------------

    /// Waits until every task carrying `label` (as label or cohort) has finished.
    ///
    /// ### Errors
    /// [`RuntimeError::Closed`] if the scope has already terminated.
    pub async fn wait_for_function(&self, label: &str) -> Result<(), RuntimeError> {
        if self.state.is_terminated() {
            return Err(self.closed_error());
        }
        self.drain_label(label, None).await;
        Ok(())
    }

    /// Like [`wait_for_function`](Self::wait_for_function), bounded by `timeout`.
    ///
    /// Returns `true` iff every carrier finished in time. Nothing is cancelled.
    pub async fn wait_for_function_timeout(&self, label: &str, timeout: Duration) -> bool {
        self.drain_label(label, Some(timeout)).await
    }

    /// Drains one cohort while leaving the rest of the scope running.
    ///
    /// Cancels every task carrying `label`, waits up to `timeout` for them to finish, then
    /// cancels and removes whatever is left.
    ///
    /// ### Errors
    /// [`RuntimeError::ShutdownTimeout`] (advisory) if tasks had to be forced.
    pub async fn shutdown_function(
        &self,
        label: &str,
        timeout: Duration,
    ) -> Result<(), RuntimeError> {
        self.ctx.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_scope(Arc::clone(&self.path))
                .with_task(label)
                .with_safe(true),
        );

        match self.drain_cohort(label, timeout).await {
            0 => Ok(()),
            stuck => Err(RuntimeError::ShutdownTimeout {
                scope: format!("{}/{}", self.path, label),
                timeout,
                stuck,
            }),
        }
    }

    /// Cancel carriers, wait, force the rest. Returns the number of forced tasks.
    async fn drain_cohort(&self, label: &str, timeout: Duration) -> usize {
        let start = Instant::now();
        for task in self.carriers(label) {
            task.cancel();
        }

        if self.drain_label(label, Some(timeout)).await {
            self.ctx.publish(
                Event::new(EventKind::CohortDrained)
                    .with_scope(Arc::clone(&self.path))
                    .with_task(label)
                    .with_elapsed(start.elapsed()),
            );
            return 0;
        }

        let stuck = self.force_remove(|t| t.carries(label));
        self.ctx.publish(
            Event::new(EventKind::CohortForced)
                .with_scope(Arc::clone(&self.path))
                .with_task(label)
                .with_elapsed(start.elapsed())
                .with_stuck(stuck),
        );
        stuck
    }

    /// Waits for the group latch and for every current carrier of `label`.
    ///
    /// The group entry is removed afterwards whether or not the wait completed.
    async fn drain_label(&self, label: &str, timeout: Option<Duration>) -> bool {
        let group = self.group(label);
        let carriers = self.carriers(label);

        let drain = async {
            group.wait().await;
            join_all(carriers.iter().map(|t| t.finished())).await;
        };
        let drained = match timeout {
            Some(t) => time::timeout(t, drain).await.is_ok(),
            None => {
                drain.await;
                true
            }
        };

        self.remove_group(label, &group);
        drained
    }

    fn group(&self, label: &str) -> Arc<CompletionLatch> {
        let existing = self.maps.read().groups.get(label).cloned();
        if let Some(group) = existing {
            return group;
        }
        Arc::clone(self.maps.write().groups.entry(Arc::from(label)).or_default())
    }

    /// Removes the group entry only if it is still the instance we waited on.
    fn remove_group(&self, label: &str, group: &Arc<CompletionLatch>) {
        let mut maps = self.maps.write();
        if maps
            .groups
            .get(label)
            .is_some_and(|g| Arc::ptr_eq(g, group))
        {
            maps.groups.remove(label);
        }
    }

    fn carriers(&self, label: &str) -> Vec<Task> {
        self.maps
            .read()
            .tasks
            .values()
            .filter(|t| t.carries(label))
            .cloned()
            .collect()
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    /// Shuts the scope down.
    ///
    /// - `safe = true`: drain every label, wait for the scope latch up to the configured
    ///   `shutdown_timeout`, then cancel and remove whatever remains.
    /// - `safe = false`: cancel and remove every task immediately, without waiting.
    ///
    /// Both paths end by cancelling the scope token and entering
    /// [`ScopeState::Terminated`]. Calling it on a terminated scope is a no-op.
    ///
    /// ### Errors
    /// [`RuntimeError::ShutdownTimeout`] (advisory) when a safe shutdown had to force
    /// tasks. The shutdown itself has completed in that case.
    pub async fn shutdown(&self, safe: bool) -> Result<(), RuntimeError> {
        if self.state.is_terminated() {
            return Ok(());
        }

        let start = Instant::now();
        let timeout = self.ctx.shutdown_timeout();
        self.ctx.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_scope(Arc::clone(&self.path))
                .with_safe(safe),
        );

        let stuck = if safe {
            self.shutdown_safe(timeout).await
        } else {
            self.shutdown_unsafe()
        };

        // Spawns that registered before the token flipped are swept here; later ones are
        // rejected under the lock.
        self.token.cancel();
        self.force_remove(|_| true);
        self.maps.write().groups.clear();
        if self.state.advance(ScopeState::Terminated) == ScopeState::Terminated {
            // Overtaken by an unsafe shutdown that already reported completion.
            return Ok(());
        }

        self.ctx.publish(
            Event::new(EventKind::ShutdownCompleted)
                .with_scope(Arc::clone(&self.path))
                .with_safe(safe)
                .with_elapsed(start.elapsed())
                .with_stuck(stuck),
        );

        if safe && stuck > 0 {
            return Err(RuntimeError::ShutdownTimeout {
                scope: self.path.to_string(),
                timeout,
                stuck,
            });
        }
        Ok(())
    }

    async fn shutdown_safe(&self, timeout: Duration) -> usize {
        self.state.advance(ScopeState::GracefulDraining);

        let labels: BTreeSet<Arc<str>> = self
            .list_tasks()
            .iter()
            .flat_map(|t| std::iter::once(t.label_arc()).chain(t.cohort_arc()))
            .cloned()
            .collect();

        let mut stuck: usize = join_all(labels.iter().map(|l| self.drain_cohort(l, timeout)))
            .await
            .into_iter()
            .sum();

        if !self.latch.wait_timeout(timeout).await {
            self.state.advance(ScopeState::ForcedCancel);
            let forced = self.force_remove(|_| true);
            self.ctx.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_scope(Arc::clone(&self.path))
                    .with_timeout(timeout)
                    .with_stuck(forced),
            );
            stuck += forced;
        }
        stuck
    }

    fn shutdown_unsafe(&self) -> usize {
        self.state.advance(ScopeState::ForcedCancel);
        self.force_remove(|_| true)
    }

    /// Cancels and removes matching tasks. Returns how many were still running.
    fn force_remove(&self, pred: impl Fn(&Task) -> bool) -> usize {
        let victims: Vec<Task> = self
            .maps
            .read()
            .tasks
            .values()
            .filter(|t| pred(t))
            .cloned()
            .collect();

        let mut stuck = 0;
        for task in victims {
            task.cancel();
            if self.remove_entry(task.id()).is_some() && !task.is_done() {
                stuck += 1;
            }
        }
        stuck
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn remove_entry(&self, id: TaskId) -> Option<Task> {
        let mut maps = self.maps.write();
        let removed = maps.tasks.remove(&id);
        if removed.is_some() {
            self.count.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    fn closed_error(&self) -> RuntimeError {
        RuntimeError::Closed {
            scope: self.path.to_string(),
        }
    }
}

#[async_trait]
impl Child for LocalScope {
    async fn shutdown_child(&self, safe: bool) -> Result<(), RuntimeError> {
        self.shutdown(safe).await
    }

    fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }
}

/// Runs cleanup for one task when dropped.
///
/// Dropped at the end of [`run_task`], while unwinding from an unrecovered panic, or when
/// the runtime drops the future.
struct CompletionGuard {
    scope: Arc<LocalScope>,
    task: Task,
    cohort: Option<Arc<CompletionLatch>>,
    started: Instant,
    outcome: Option<Outcome>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or_else(|| {
            if std::thread::panicking() {
                Outcome::Panicked {
                    recovered: false,
                    message: "panicked with fault recovery disabled".into(),
                }
            } else {
                Outcome::Aborted
            }
        });
        self.scope
            .complete(&self.task, self.cohort.take(), outcome, self.started.elapsed());
    }
}

async fn run_task<Fut>(mut guard: CompletionGuard, work: Fut, recover: bool)
where
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    let outcome = if recover {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(res) => Outcome::from_result(res),
            Err(payload) => Outcome::from_panic(payload.as_ref(), true),
        }
    } else {
        Outcome::from_result(work.await)
    };
    guard.outcome = Some(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::Bus;

    fn scope() -> Arc<LocalScope> {
        let ctx = ScopeContext::new(Bus::new(64), Config::default());
        LocalScope::new("app", "local".into(), &CancellationToken::new(), ctx)
    }

    async fn until(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_task_leaves_map_after_completion() {
        let s = scope();
        let id = s
            .spawn("once", |_ctx| async { Ok(()) }, SpawnOptions::new())
            .unwrap();
        let task = s.get_task(id).ok();

        if let Some(task) = task {
            task.finished().await;
        }
        until(|| s.task_count() == 0).await;
        assert!(s.list_tasks().is_empty());
        assert_eq!(s.pending(), 0);
        assert!(s.get_task(id).is_err());
    }

    #[tokio::test]
    async fn test_counter_matches_map() {
        let s = scope();
        for i in 0..10 {
            s.spawn(
                format!("w{}", i % 3),
                |ctx: CancellationToken| async move {
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                },
                SpawnOptions::new(),
            )
            .unwrap();
        }
        assert_eq!(s.task_count(), 10);
        assert_eq!(s.task_count(), s.list_tasks().len());
        s.shutdown(false).await.unwrap();
        assert_eq!(s.task_count(), 0);
    }

    #[tokio::test]
    async fn test_negative_counter_is_recomputed() {
        let s = scope();
        s.count.store(-3, Ordering::Release);
        assert_eq!(s.task_count(), 0);
        assert_eq!(s.count.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn test_cancel_task_removes_and_cancels() {
        let s = scope();
        let id = s
            .spawn(
                "sleeper",
                |ctx: CancellationToken| async move {
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                },
                SpawnOptions::new(),
            )
            .unwrap();
        let task = s.get_task(id).unwrap();

        s.cancel_task(id).unwrap();
        assert!(task.token().is_cancelled());
        assert_eq!(s.task_count(), 0);
        assert!(matches!(
            s.cancel_task(id),
            Err(RuntimeError::NotFound {
                kind: EntityKind::Task,
                ..
            })
        ));

        task.finished().await;
        until(|| s.pending() == 0).await;
    }

    #[tokio::test]
    async fn test_spawn_rejected_after_shutdown() {
        let s = scope();
        s.shutdown(true).await.unwrap();
        assert_eq!(s.state(), ScopeState::Terminated);
        let err = s
            .spawn("late", |_ctx| async { Ok(()) }, SpawnOptions::new())
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Closed {
                scope: "app/local".into()
            }
        );
    }

    #[tokio::test]
    async fn test_group_created_by_wait_is_removed() {
        let s = scope();
        assert!(
            s.wait_for_function_timeout("nobody", Duration::from_millis(10))
                .await
        );
        assert!(s.list_function_labels().is_empty());
    }

    #[tokio::test]
    async fn test_function_pending_tracks_cohort_until_drained() {
        let s = scope();
        for _ in 0..2 {
            s.spawn(
                "member",
                |ctx: CancellationToken| async move {
                    ctx.cancelled().await;
                    Err(TaskError::Canceled)
                },
                SpawnOptions::new().with_cohort("batch"),
            )
            .unwrap();
        }
        assert_eq!(s.function_pending("batch").unwrap(), 2);

        s.shutdown_function("batch", Duration::from_secs(1))
            .await
            .unwrap();
        for label in ["batch", "never-spawned"] {
            match s.function_pending(label) {
                Err(RuntimeError::NotFound { kind, key }) => {
                    assert_eq!(kind, EntityKind::FunctionGroup);
                    assert_eq!(key, label);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_task_token() {
        let s = scope();
        let id = s
            .spawn(
                "bounded",
                |ctx: CancellationToken| async move {
                    ctx.cancelled().await;
                    Err(TaskError::Timeout {
                        timeout: Duration::from_millis(50),
                    })
                },
                SpawnOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .unwrap();
        let task = s.get_task(id).unwrap();

        time::timeout(Duration::from_secs(1), task.finished())
            .await
            .unwrap();
        assert!(task.token().is_cancelled());
        assert!(!s.token().is_cancelled());
    }
}
