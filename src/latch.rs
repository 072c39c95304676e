//! # Countdown latch.
//!
//! [`CompletionLatch`] counts outstanding work: `add(n)` before launching, `done()` when each
//! unit finishes, `wait()` until the count is back to zero.
//!
//! ## Rules
//! - `add`/`done` are synchronous and never block; any number of tasks may call them.
//! - A waiter observes every `add` that happened before the wait began.
//! - A latch is reusable: after reaching zero it may be incremented again.
//! - `done()` on a zero count is a bookkeeping bug: `debug_assert!` in debug builds,
//!   saturating at zero (and counted in [`CompletionLatch::underflows`]) in release builds.
//!
//! Built on [`tokio::sync::watch`] so that every waiter wakes on the transition to zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

/// Countdown synchronization primitive.
#[derive(Debug)]
pub struct CompletionLatch {
    count: watch::Sender<usize>,
    underflows: AtomicU64,
}

impl CompletionLatch {
    /// Creates a latch with a zero count.
    pub fn new() -> Self {
        let (count, _rx) = watch::channel(0usize);
        Self {
            count,
            underflows: AtomicU64::new(0),
        }
    }

    /// Increments the count by `n`.
    pub fn add(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.count.send_modify(|c| *c += n);
    }

    /// Decrements the count by one, waking waiters when it reaches zero.
    pub fn done(&self) {
        let mut underflow = false;
        self.count.send_if_modified(|c| {
            if *c == 0 {
                underflow = true;
                false
            } else {
                *c -= 1;
                true
            }
        });

        if underflow {
            self.underflows.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("completion latch done() without matching add()");
            debug_assert!(false, "completion latch underflow");
        }
    }

    /// Returns the current count.
    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Returns how many times `done()` was called on a zero count.
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }

    /// Waits until the count reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we borrow it.
        let _ = rx.wait_for(|c| *c == 0).await;
    }

    /// Waits until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` iff the count reached zero in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait()).await.is_ok()
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls [`CompletionLatch::done`] when dropped.
///
/// Used by cascading shutdowns so the parent latch is released even if the child future
/// is dropped or panics.
pub(crate) struct DoneOnDrop(pub(crate) std::sync::Arc<CompletionLatch>);

impl Drop for DoneOnDrop {
    fn drop(&mut self) {
        self.0.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_returns_immediately_on_zero() {
        let latch = CompletionLatch::new();
        assert!(latch.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_done_releases_waiter() {
        let latch = Arc::new(CompletionLatch::new());
        latch.add(16);

        for i in 0..16u64 {
            let l = latch.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(i)).await;
                l.done();
            });
        }

        assert!(latch.wait_timeout(Duration::from_secs(5)).await);
        assert_eq!(latch.count(), 0);
        assert_eq!(latch.underflows(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_expires() {
        let latch = CompletionLatch::new();
        latch.add(1);
        assert!(!latch.wait_timeout(Duration::from_millis(100)).await);
        latch.done();
        assert!(latch.wait_timeout(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_reusable_after_zero() {
        let latch = CompletionLatch::new();
        latch.add(1);
        latch.done();
        latch.wait().await;
        latch.add(2);
        assert_eq!(latch.count(), 2);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_underflow_saturates_in_release() {
        let latch = CompletionLatch::new();
        latch.done();
        assert_eq!(latch.count(), 0);
        assert_eq!(latch.underflows(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "completion latch underflow")]
    fn test_underflow_panics_in_debug() {
        let latch = CompletionLatch::new();
        latch.done();
    }

    #[test]
    fn test_done_on_drop() {
        let latch = Arc::new(CompletionLatch::new());
        latch.add(1);
        drop(DoneOnDrop(latch.clone()));
        assert_eq!(latch.count(), 0);
    }
}
