//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] owns one bounded queue and one worker per [`Subscribe`]r. The root
//! listener hands it every bus event; the set filters by [`Subscribe::interested`], queues
//! without waiting, and counts what it had to drop.
//!
//! ```text
//! emit(Arc<Event>)
//!   for each subscriber:
//!     interested(kind)? ── no ──► skip
//!        │ yes
//!        ▼
//!     try_send ── full/closed ──► dropped += 1 ─► SubscriberOverflow (not for overflow events)
//!        │ ok
//!        ▼
//!     worker: on_event() ── panic ──► SubscriberPanicked, worker keeps going
//!
//! shutdown(grace)
//!   close queues ─► wait workers (≤ grace) ─► abort the rest
//! ```
//!
//! Each subscriber sees its events in bus order. There is no ordering across subscribers.
//!
//! Panics are caught with `AssertUnwindSafe`: a subscriber that panics while holding one of
//! its own locks may leave that state poisoned or half-updated.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;
use crate::tasks::Outcome;

/// Per-subscriber counts of events dropped on a full or closed queue.
///
/// Cheap to clone; every clone reads the same live counters.
#[derive(Clone, Debug, Default)]
pub struct SubscriberDrops(Arc<[(&'static str, Arc<AtomicU64>)]>);

impl SubscriberDrops {
    /// Returns `(subscriber name, dropped events)` in registration order.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.0
            .iter()
            .map(|(name, n)| (*name, n.load(Ordering::Relaxed)))
            .collect()
    }

    /// Returns the dropped events summed over all subscribers.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, n)| n.load(Ordering::Relaxed)).sum()
    }
}

struct Queue {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: Arc<AtomicU64>,
}

/// Bounded, non-blocking fan-out of events to subscribers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: JoinSet<()>,
    drops: SubscriberDrops,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime when `subs` is non-empty. Panics and
    /// overflows are reported on `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut queues = Vec::with_capacity(subs.len());
        let mut counters = Vec::with_capacity(subs.len());
        let mut workers = JoinSet::new();

        for sub in subs {
            let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
            let dropped = Arc::new(AtomicU64::new(0));

            workers.spawn(run_worker(Arc::clone(&sub), rx, bus.clone()));
            counters.push((sub.name(), Arc::clone(&dropped)));
            queues.push(Queue { sub, tx, dropped });
        }

        Self {
            queues,
            workers,
            drops: SubscriberDrops(counters.into()),
            bus,
        }
    }

    /// Returns `true` if no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Returns a live handle on the per-subscriber drop counters.
    pub fn drops(&self) -> SubscriberDrops {
        self.drops.clone()
    }

    /// Queues `event` for every interested subscriber without waiting.
    ///
    /// A full or closed queue drops the event for that subscriber only, bumps its drop
    /// counter and publishes [`EventKind::SubscriberOverflow`]. Overflow events that
    /// themselves overflow are counted but not re-published.
    pub fn emit(&self, event: Arc<Event>) {
        for q in &self.queues {
            if !q.sub.interested(event.kind) {
                continue;
            }
            let reason = match q.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            let dropped = q.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(q.sub.name(), reason, dropped));
            }
        }
    }

    /// Closes every queue and waits up to `grace` for the workers to drain.
    ///
    /// Workers still running after `grace` are aborted; their count is returned. A zero
    /// `grace` aborts every worker that has not already exited.
    pub async fn shutdown(self, grace: Duration) -> usize {
        let Self {
            queues,
            mut workers,
            ..
        } = self;
        drop(queues);

        let drained = tokio::time::timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if drained {
            return 0;
        }

        let aborted = workers.len();
        tracing::warn!(aborted, ?grace, "aborting subscriber workers still busy after grace");
        workers.abort_all();
        aborted
    }
}

async fn run_worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = match Outcome::from_panic(payload.as_ref(), true) {
                Outcome::Panicked { message, .. } => message.to_string(),
                other => other.as_label().to_string(),
            };
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    struct Recorder(Arc<Mutex<Vec<EventKind>>>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().push(ev.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    /// Accepts only completions and never returns from `on_event`.
    struct Wedged;

    #[async_trait]
    impl Subscribe for Wedged {
        async fn on_event(&self, _ev: &Event) {
            std::future::pending::<()>().await;
        }
        fn name(&self) -> &'static str {
            "wedged"
        }
        fn interested(&self, kind: EventKind) -> bool {
            kind == EventKind::TaskCompleted
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Panicker), Arc::new(Recorder(seen.clone()))],
            bus.clone(),
        );

        set.emit(Arc::new(Event::new(EventKind::TaskSpawned)));

        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.task.as_deref(), Some("panicker"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));

        assert_eq!(set.shutdown(Duration::from_secs(1)).await, 0);
        assert_eq!(*seen.lock(), vec![EventKind::TaskSpawned]);
    }

    #[tokio::test]
    async fn test_uninterested_kinds_are_not_queued_or_counted() {
        let bus = Bus::new(16);
        let set = SubscriberSet::new(vec![Arc::new(Wedged)], bus);

        for _ in 0..10 {
            set.emit(Arc::new(Event::new(EventKind::TaskSpawned)));
        }
        assert_eq!(set.drops().total(), 0);
        set.shutdown(Duration::ZERO).await;
    }

    #[tokio::test]
    async fn test_full_queue_counts_drops_per_subscriber() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Wedged), Arc::new(Recorder(seen.clone()))],
            bus,
        );
        let drops = set.drops();

        // The first event is taken by the worker, the second fills the queue.
        set.emit(Arc::new(Event::new(EventKind::TaskCompleted)));
        tokio::task::yield_now().await;
        for _ in 0..4 {
            set.emit(Arc::new(Event::new(EventKind::TaskCompleted)));
        }

        let snap = drops.snapshot();
        assert_eq!(snap[0].0, "wedged");
        assert!(snap[0].1 >= 3, "wedged dropped {}", snap[0].1);
        assert_eq!(snap[1], ("recorder", 0));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.task.as_deref(), Some("wedged"));
        assert_eq!(ev.reason.as_deref(), Some("queue full, 1 dropped"));

        set.shutdown(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_hanging_worker_after_grace() {
        let bus = Bus::new(16);
        let set = SubscriberSet::new(vec![Arc::new(Wedged)], bus);
        set.emit(Arc::new(Event::new(EventKind::TaskCompleted)));
        tokio::task::yield_now().await;

        let start = Instant::now();
        let aborted = set.shutdown(Duration::from_millis(100)).await;
        assert_eq!(aborted, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
