//! # Task records and spawn options.
//!
//! This module provides the task-related types:
//! - [`Task`] - bookkeeping record of one spawned unit of work
//! - [`TaskId`] - globally unique identifier
//! - [`SpawnOptions`] - typed options for `LocalScope::spawn`
//! - [`Outcome`] - how a task ended

mod options;
mod outcome;
mod task;

pub use options::SpawnOptions;
pub use outcome::Outcome;
pub use task::{Task, TaskId};
