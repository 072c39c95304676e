//! # Scope lifecycle state.
//!
//! ```text
//! safe:    Running ──► GracefulDraining ──► ForcedCancel ──► Terminated
//!                               └───────────────────────────────┘ (drained in time)
//! unsafe:  Running ──► ForcedCancel ──► Terminated
//! ```
//!
//! Transitions only move forward. An unsafe shutdown may overtake a safe one that is
//! still draining; the safe path then cannot move the state back.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScopeState {
    /// Accepting tasks.
    Running = 0,
    /// Safe shutdown in progress: tasks are cancelled and awaited.
    GracefulDraining = 1,
    /// Remaining tasks are being cancelled and removed without waiting.
    ForcedCancel = 2,
    /// Shutdown finished; spawns are rejected.
    Terminated = 3,
}

impl ScopeState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ScopeState::Running,
            1 => ScopeState::GracefulDraining,
            2 => ScopeState::ForcedCancel,
            _ => ScopeState::Terminated,
        }
    }

    /// Returns a short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeState::Running => "running",
            ScopeState::GracefulDraining => "graceful_draining",
            ScopeState::ForcedCancel => "forced_cancel",
            ScopeState::Terminated => "terminated",
        }
    }
}

/// Atomic, forward-only [`ScopeState`] cell.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ScopeState::Running as u8))
    }

    pub(crate) fn get(&self) -> ScopeState {
        ScopeState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `to` unless the state is already further along. Returns the previous state.
    pub(crate) fn advance(&self, to: ScopeState) -> ScopeState {
        ScopeState::from_u8(self.0.fetch_max(to as u8, Ordering::AcqRel))
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.get() == ScopeState::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_never_moves_backwards() {
        let s = StateCell::new();
        assert_eq!(s.advance(ScopeState::ForcedCancel), ScopeState::Running);
        assert_eq!(
            s.advance(ScopeState::GracefulDraining),
            ScopeState::ForcedCancel
        );
        assert_eq!(s.get(), ScopeState::ForcedCancel);
        s.advance(ScopeState::Terminated);
        assert!(s.is_terminated());
    }
}
