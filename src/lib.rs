//! # scopevisor
//!
//! **Scopevisor** is a supervision tree for async work on tokio.
//!
//! It organizes independently running tasks into named scopes, tracks their liveness and
//! shuts them down in bounded time, either gracefully (cancel, drain, then force) or
//! immediately.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Root (process token, Config, Bus, subscriber listener)           │
//! └──────┬───────────────────────────────────────────┬────────────────┘
//!        ▼                                           ▼
//!  ┌─────────────────┐                         ┌─────────────────┐
//!  │ AppScope "api"  │                         │ AppScope "jobs" │
//!  └──┬──────────┬───┘                         └──┬──────────────┘
//!     ▼          ▼                                ▼
//! ┌────────┐ ┌────────┐                      ┌──────────┐
//! │ Local  │ │ Local  │                      │  Local   │
//! │ "http" │ │ "grpc" │                      │ "cron"   │
//! └─┬───┬──┘ └──┬─────┘                      └─┬──────┬─┘
//!   ▼   ▼       ▼                              ▼      ▼
//!  Task Task   Task                           Task   Task
//!
//! Tokens:    root ─► app ─► local ─► task (─► deadline)   cancellation flows down only
//! Latches:   task completion ─► cohort latch, local latch ─► app/root shutdown waits
//! Events:    every level ─► Bus ─► listener ─► SubscriberSet ─► Subscribe::on_event
//! ```
//!
//! ### Task lifecycle
//! ```text
//! LocalScope::spawn(label, work, SpawnOptions)
//!   ├─► register (task map, counter, scope latch, cohort latch) under one lock
//!   ├─► publish TaskSpawned
//!   └─► tokio::spawn ─► work(token).await  (panics caught when fault recovery is on)
//!         └─► completion guard: TaskCompleted ─► latches done ─► signal ─► cancel ─► remove
//! ```
//!
//! ### Shutdown
//! ```text
//! shutdown(true):  Running ─► GracefulDraining ─► [ForcedCancel] ─► Terminated
//! shutdown(false): Running ─► ForcedCancel ─► Terminated
//! ```
//! Cancellation is cooperative: work functions must observe their token. Forced
//! cancellation removes a task from the tree but cannot stop code that ignores its token.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Scope hierarchy with cascading graceful/forced shutdown.     | [`Root`], [`AppScope`], [`LocalScope`]      |
//! | **Tasks**         | Tracked work with deadlines, fault recovery and cohorts.     | [`SpawnOptions`], [`Task`], [`Outcome`]     |
//! | **Primitives**    | Hierarchical cancellation and countdown latches.             | [`token`], [`CompletionLatch`]              |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).       | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for supervision and task execution.             | [`RuntimeError`], [`TaskError`]             |
//! | **Configuration** | Shared runtime settings with key-based updates.              | [`Config`], [`ConfigValue`]                 |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] subscriber that emits `tracing` records.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use scopevisor::{Config, Root, SpawnOptions, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         shutdown_timeout: Duration::from_secs(5),
//!         ..Config::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn scopevisor::Subscribe>> = vec![Arc::new(scopevisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn scopevisor::Subscribe>> = Vec::new();
//!
//!     let root = Root::builder(cfg).with_subscribers(subs).build();
//!     let workers = root.app("jobs").local("workers");
//!
//!     workers.spawn(
//!         "ticker",
//!         |ctx: CancellationToken| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => return Err(TaskError::Canceled),
//!                     _ = tokio::time::sleep(Duration::from_millis(50)) => {}
//!                 }
//!             }
//!         },
//!         SpawnOptions::new(),
//!     )?;
//!
//!     root.shutdown(true).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod global;
mod latch;
mod scopes;
mod subscribers;
mod tasks;

pub mod token;

// ---- Public re-exports ----

pub use config::{Config, ConfigValue, MetricsConfig};
pub use error::{EntityKind, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use global::{default_root, reset_default_root};
pub use latch::CompletionLatch;
pub use scopes::{AppScope, LocalScope, Root, RootBuilder, ScopeState};
pub use subscribers::{Subscribe, SubscriberDrops, SubscriberSet};
pub use tasks::{Outcome, SpawnOptions, Task, TaskId};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
