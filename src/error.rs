//! Error types used by the scopevisor runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the supervision tree itself (lookups, shutdown, config).
//! - [`TaskError`] — errors returned by individual work functions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// Kind of entity a lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// An [`AppScope`](crate::AppScope) under a root.
    App,
    /// A [`LocalScope`](crate::LocalScope) under an app scope.
    Local,
    /// A task inside a local scope.
    Task,
    /// A function group (label cohort) inside a local scope.
    FunctionGroup,
}

impl EntityKind {
    /// Returns a short stable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::App => "app",
            EntityKind::Local => "local",
            EntityKind::Task => "task",
            EntityKind::FunctionGroup => "function_group",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Errors produced by the scopevisor runtime.
///
/// Not every variant is a failure:
/// - [`RuntimeError::AlreadyExists`] is informational, the existing instance is still usable;
/// - [`RuntimeError::ShutdownTimeout`] is advisory, the shutdown itself completed through
///   forced cancellation.
///
/// Use [`RuntimeError::is_advisory`] to tell them apart from real failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A scope, task or function group was looked up by an absent key.
    #[error("{kind} {key:?} not found")]
    NotFound {
        /// What was looked up.
        kind: EntityKind,
        /// The key that was not found.
        key: String,
    },

    /// A create request found an existing instance (informational).
    #[error("{kind} {key:?} already exists")]
    AlreadyExists {
        /// What was created.
        kind: EntityKind,
        /// The key that already exists.
        key: String,
    },

    /// A graceful wait exceeded its bound; remaining tasks were force-cancelled.
    #[error("shutdown of {scope} exceeded {timeout:?}; stuck: {stuck}; forced cancellation")]
    ShutdownTimeout {
        /// Path of the scope (or `scope/label` for a function group).
        scope: String,
        /// The configured bound.
        timeout: Duration,
        /// What had to be forced. For a local scope or function group: tasks. For an app
        /// scope or the root: tasks reported by child scopes that finished late, plus child
        /// scopes forced when the parent's own timeout elapsed.
        stuck: usize,
    },

    /// A config update supplied a value of the wrong kind or an unknown key.
    #[error("invalid config {key:?}: {reason}")]
    Configuration {
        /// The config key.
        key: String,
        /// Why the update was rejected.
        reason: String,
    },

    /// The scope no longer accepts tasks (terminated, or its token was cancelled).
    #[error("scope {scope} is closed")]
    Closed {
        /// Path of the scope.
        scope: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use scopevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::ShutdownTimeout {
    ///     scope: "api/http".into(),
    ///     timeout: Duration::from_secs(5),
    ///     stuck: 2,
    /// };
    /// assert_eq!(err.as_label(), "runtime_shutdown_timeout");
    /// assert!(err.is_advisory());
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NotFound { .. } => "runtime_not_found",
            RuntimeError::AlreadyExists { .. } => "runtime_already_exists",
            RuntimeError::ShutdownTimeout { .. } => "runtime_shutdown_timeout",
            RuntimeError::Configuration { .. } => "runtime_configuration",
            RuntimeError::Closed { .. } => "runtime_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::NotFound { kind, key } => format!("{kind} not found: {key}"),
            RuntimeError::AlreadyExists { kind, key } => format!("{kind} exists: {key}"),
            RuntimeError::ShutdownTimeout {
                scope,
                timeout,
                stuck,
            } => format!("scope={scope} timeout={timeout:?} stuck={stuck}"),
            RuntimeError::Configuration { key, reason } => format!("config {key}: {reason}"),
            RuntimeError::Closed { scope } => format!("scope closed: {scope}"),
        }
    }

    /// Returns `true` for conditions that callers should treat as success.
    ///
    /// [`AlreadyExists`](RuntimeError::AlreadyExists) and
    /// [`ShutdownTimeout`](RuntimeError::ShutdownTimeout) are advisory.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            RuntimeError::AlreadyExists { .. } | RuntimeError::ShutdownTimeout { .. }
        )
    }

    pub(crate) fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        RuntimeError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn already_exists(kind: EntityKind, key: impl Into<String>) -> Self {
        RuntimeError::AlreadyExists {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// # Errors returned by work functions.
///
/// A work function spawned on a [`LocalScope`](crate::LocalScope) returns
/// `Result<(), TaskError>`. The error is recorded in the task outcome; it never
/// propagates to the spawner.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work gave up because its deadline passed.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work observed cancellation and exited early.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use scopevisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Builds a [`TaskError::Fail`] from anything displayable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Indicates a graceful exit (the work function honoured cancellation).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_variants() {
        assert!(RuntimeError::already_exists(EntityKind::App, "a").is_advisory());
        assert!(
            RuntimeError::ShutdownTimeout {
                scope: "a/b".into(),
                timeout: Duration::from_millis(10),
                stuck: 1,
            }
            .is_advisory()
        );
        assert!(!RuntimeError::not_found(EntityKind::Task, "x").is_advisory());
        assert!(!RuntimeError::config("max_tasks", "expected int").is_advisory());
        assert!(!RuntimeError::Closed { scope: "a/b".into() }.is_advisory());
    }

    #[test]
    fn test_display_mentions_kind_and_key() {
        let err = RuntimeError::not_found(EntityKind::FunctionGroup, "ingest");
        assert_eq!(err.to_string(), "function_group \"ingest\" not found");
        assert_eq!(err.as_label(), "runtime_not_found");
    }

    #[test]
    fn test_task_error_labels() {
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
        assert!(TaskError::Canceled.is_cancellation());
        let e = TaskError::fail("boom");
        assert_eq!(e.as_message(), "error: boom");
        assert!(!e.is_cancellation());
    }
}
