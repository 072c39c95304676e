//! # LogWriter — structured event logger
//!
//! A subscriber that turns every [`Event`] into one [`tracing`] record with structured
//! fields. Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO scopevisor: task spawned scope="billing/workers" task="invoice" id=3b0c…
//! INFO scopevisor: task completed scope="billing/workers" task="invoice" outcome="success" elapsed_ms=102
//! WARN scopevisor: task panicked scope="billing/workers" task="pdf" recovered=true reason="index out of bounds"
//! INFO scopevisor: shutdown requested scope="billing" safe=true
//! WARN scopevisor: grace exceeded scope="billing/workers" timeout_ms=5000 stuck=2
//! INFO scopevisor: shutdown completed scope="billing" elapsed_ms=5013 stuck=2
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::tasks::Outcome;

const TARGET: &str = "scopevisor";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let scope = e.scope.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskSpawned => {
                debug!(target: TARGET, scope, task, id = ?e.task_id, cohort = ?e.cohort, timeout_ms = ?e.timeout_ms, "task spawned");
            }
            EventKind::TaskCompleted => match &e.outcome {
                Some(Outcome::Panicked { recovered, message }) => {
                    warn!(target: TARGET, scope, task, id = ?e.task_id, recovered, reason = %message, "task panicked");
                }
                Some(Outcome::Failed { label, message }) => {
                    warn!(target: TARGET, scope, task, id = ?e.task_id, error = label, reason = %message, elapsed_ms = ?e.elapsed_ms, "task failed");
                }
                outcome => {
                    info!(target: TARGET, scope, task, id = ?e.task_id, outcome = ?outcome.as_ref().map(Outcome::as_label), elapsed_ms = ?e.elapsed_ms, "task completed");
                }
            },
            EventKind::TimeoutHit => {
                info!(target: TARGET, scope, task, id = ?e.task_id, timeout_ms = ?e.timeout_ms, "task deadline hit");
            }
            EventKind::TaskCancelled => {
                info!(target: TARGET, scope, task, id = ?e.task_id, "task cancelled");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, scope, cohort = ?e.task, safe = ?e.safe, "shutdown requested");
            }
            EventKind::CohortDrained => {
                info!(target: TARGET, scope, cohort = task, elapsed_ms = ?e.elapsed_ms, "cohort drained");
            }
            EventKind::CohortForced => {
                warn!(target: TARGET, scope, cohort = task, elapsed_ms = ?e.elapsed_ms, stuck = ?e.stuck, "cohort forced");
            }
            EventKind::GraceExceeded => {
                warn!(target: TARGET, scope, timeout_ms = ?e.timeout_ms, stuck = ?e.stuck, "grace exceeded");
            }
            EventKind::ShutdownCompleted => {
                info!(target: TARGET, scope, safe = ?e.safe, elapsed_ms = ?e.elapsed_ms, stuck = ?e.stuck, "shutdown completed");
            }
            EventKind::ScopeCreated => {
                debug!(target: TARGET, scope, "scope created");
            }
            EventKind::ConfigUpdated => {
                info!(target: TARGET, key = ?e.reason, "config updated");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = task, reason = ?e.reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, subscriber = task, reason = ?e.reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
