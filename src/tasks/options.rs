//! # Spawn options.
//!
//! [`SpawnOptions`] is a closed, typed set of knobs for
//! [`LocalScope::spawn`](crate::LocalScope::spawn). Options compose in any order.
//!
//! | option                  | default | effect                                                   |
//! |-------------------------|---------|----------------------------------------------------------|
//! | `with_timeout(d)`       | none    | task token self-cancels after `d` (cooperative)          |
//! | `with_fault_recovery(b)`| `true`  | panics are caught at the task boundary and reported      |
//! | `with_cohort(label)`    | none    | task counts against the function group `label`           |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use scopevisor::SpawnOptions;
//!
//! let opts = SpawnOptions::new()
//!     .with_cohort("ingest")
//!     .with_timeout(Duration::from_secs(2));
//!
//! assert_eq!(opts.timeout(), Some(Duration::from_secs(2)));
//! assert_eq!(opts.cohort(), Some("ingest"));
//! assert!(opts.fault_recovery());
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Options for a single spawn.
#[derive(Clone, Debug)]
pub struct SpawnOptions {
    timeout: Option<Duration>,
    fault_recovery: bool,
    cohort: Option<Arc<str>>,
}

impl SpawnOptions {
    /// Default options: no timeout, fault recovery on, no cohort.
    pub fn new() -> Self {
        Self {
            timeout: None,
            fault_recovery: true,
            cohort: None,
        }
    }

    /// Derives the task token with a deadline.
    ///
    /// The work function must observe its token to react; nothing is preempted.
    /// `Duration::ZERO` is treated as "no timeout".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout).filter(|d| *d > Duration::ZERO);
        self
    }

    /// Enables or disables panic recovery at the task boundary.
    ///
    /// With recovery disabled a panic unwinds into the tokio task, where the runtime's panic
    /// hook reports it. Scope bookkeeping is cleaned up either way.
    pub fn with_fault_recovery(mut self, enabled: bool) -> Self {
        self.fault_recovery = enabled;
        self
    }

    /// Registers the task against the function group `label`.
    pub fn with_cohort(mut self, label: impl Into<Arc<str>>) -> Self {
        self.cohort = Some(label.into());
        self
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns whether fault recovery is enabled.
    pub fn fault_recovery(&self) -> bool {
        self.fault_recovery
    }

    /// Returns the cohort label.
    pub fn cohort(&self) -> Option<&str> {
        self.cohort.as_deref()
    }

    pub(crate) fn cohort_arc(&self) -> Option<Arc<str>> {
        self.cohort.clone()
    }
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent() {
        let a = SpawnOptions::new()
            .with_fault_recovery(false)
            .with_cohort("c")
            .with_timeout(Duration::from_millis(5));
        let b = SpawnOptions::new()
            .with_timeout(Duration::from_millis(5))
            .with_cohort("c")
            .with_fault_recovery(false);
        assert_eq!(a.timeout(), b.timeout());
        assert_eq!(a.cohort(), b.cohort());
        assert_eq!(a.fault_recovery(), b.fault_recovery());
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let opts = SpawnOptions::new().with_timeout(Duration::ZERO);
        assert_eq!(opts.timeout(), None);
    }
}
