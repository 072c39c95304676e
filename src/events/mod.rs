//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish runtime
//! events emitted by the root, app and local scopes, task completion paths and
//! subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Root`, `AppScope`, `LocalScope`, task completion guards, deadline
//!   timers, `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the Root's subscriber listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
