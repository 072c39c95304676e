//! # Subscriber trait.
//!
//! [`Subscribe`] is how metrics exporters, audit trails and alerting observe the
//! supervision tree. The tree never waits on a subscriber: spawns, completions and
//! shutdowns only publish to the bus, and the root's listener hands events to a
//! [`SubscriberSet`](crate::SubscriberSet) worker per subscriber.
//!
//! ```text
//! Root listener ─► interested(kind)? ─► [queue_capacity] ─► worker ─► on_event()
//!                        │ no                  │ full
//!                        ▼                     ▼
//!                     skipped          dropped + counted + SubscriberOverflow
//! ```
//!
//! A subscriber that hangs in `on_event` is aborted when the root shuts down (after the
//! shutdown timeout on a graceful shutdown, immediately on a forced one).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use scopevisor::{Event, EventKind, Subscribe};
//!
//! struct Stragglers;
//!
//! #[async_trait]
//! impl Subscribe for Stragglers {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.stuck.unwrap_or(0) > 0 {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "stragglers" }
//!
//!     fn interested(&self, kind: EventKind) -> bool {
//!         matches!(kind, EventKind::CohortForced | EventKind::ShutdownCompleted)
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Observer of supervision-tree events.
///
/// `on_event` runs on the subscriber's own worker, one event at a time. Panics are
/// caught and reported as [`EventKind::SubscriberPanicked`].
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events and drop counters.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns `false` for kinds this subscriber ignores; they are never queued for it.
    fn interested(&self, _kind: EventKind) -> bool {
        true
    }

    /// Queue size (min 1). Events arriving while it is full are dropped for this
    /// subscriber only.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
