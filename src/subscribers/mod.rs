//! # Event subscribers for the scopevisor runtime.
//!
//! This module provides the [`Subscribe`] trait (the observability collaborator) and the
//! [`SubscriberSet`] that fans events out to all registered subscribers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   LocalScope ── publish(Event) ──► Bus ──► Root listener ──► SubscriberSet
//!                                                                  │
//!                                                   ┌──────────────┼──────────┐
//!                                                   ▼              ▼          ▼
//!                                               LogWriter      Metrics     Custom
//! ```
//!
//! A tree built without subscribers never spawns a listener; publishing is then a no-op.

#[cfg(feature = "logging")]
mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::{SubscriberDrops, SubscriberSet};
