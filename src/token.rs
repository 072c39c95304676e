//! # Hierarchical cancellation tokens.
//!
//! Thin helpers on top of [`tokio_util::sync::CancellationToken`]:
//! - [`derive_child`] — child token cancelled with its parent or on its own;
//! - [`derive_child_with_deadline`] — same, and additionally self-cancels after a duration.
//!
//! Observing a token uses the tokio-util API directly: `token.is_cancelled()` for polling and
//! `token.cancelled().await` to wait.
//!
//! ## Rules
//! - Cancellation flows **parent → child** only; a child never cancels its parent or siblings.
//! - Cancelling twice is a no-op.
//! - Deadline expiry is indistinguishable from an explicit cancel for the observer.
//! - Cancellation is **cooperative**: it flips a signal, it never stops running code.
//!
//! ```text
//! root ──► app ──► local ──► task ──(deadline)──► timer future
//!   cancel() propagates down this chain, never up
//! ```

use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

/// Handle that cancels exactly one derived token (and its descendants).
#[derive(Clone, Debug)]
pub struct CancelFn {
    token: CancellationToken,
}

impl CancelFn {
    /// Cancels the derived token. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if the derived token is already cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Derives a child token from `parent`.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use scopevisor::token::derive_child;
///
/// let parent = CancellationToken::new();
/// let (a, cancel_a) = derive_child(&parent);
/// let (b, _cancel_b) = derive_child(&parent);
///
/// cancel_a.cancel();
/// assert!(a.is_cancelled());
/// assert!(!b.is_cancelled());
/// assert!(!parent.is_cancelled());
///
/// parent.cancel();
/// assert!(b.is_cancelled());
/// ```
pub fn derive_child(parent: &CancellationToken) -> (CancellationToken, CancelFn) {
    let token = parent.child_token();
    let cancel = CancelFn {
        token: token.clone(),
    };
    (token, cancel)
}

/// Derives a child token that also self-cancels once `timeout` has elapsed.
///
/// Must be called from within a tokio runtime (the deadline is driven by a timer future).
pub fn derive_child_with_deadline(
    parent: &CancellationToken,
    timeout: Duration,
) -> (CancellationToken, CancelFn) {
    derive_child_with_deadline_hook(parent, timeout, || {})
}

/// Like [`derive_child_with_deadline`], running `on_expire` if the deadline (and not some
/// other cancellation) is what cancelled the token.
pub(crate) fn derive_child_with_deadline_hook<F>(
    parent: &CancellationToken,
    timeout: Duration,
    on_expire: F,
) -> (CancellationToken, CancelFn)
where
    F: FnOnce() + Send + 'static,
{
    let (token, cancel) = derive_child(parent);
    let watched = token.clone();

    tokio::spawn(async move {
        let sleep = time::sleep(timeout);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {
                if !watched.is_cancelled() {
                    watched.cancel();
                    on_expire();
                }
            }
            _ = watched.cancelled() => {}
        }
    });

    (token, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_cancel_is_idempotent_and_does_not_reach_parent() {
        let parent = CancellationToken::new();
        let (child, cancel) = derive_child(&parent);
        let (grandchild, _) = derive_child(&child);

        cancel.cancel();
        cancel.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_self_cancels() {
        let parent = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let (token, _cancel) =
            derive_child_with_deadline_hook(&parent, Duration::from_millis(50), move || {
                flag.store(true, Ordering::SeqCst);
            });

        assert!(!token.is_cancelled());
        time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("deadline should cancel the token");
        tokio::task::yield_now().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel_skips_expiry_hook() {
        let parent = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let (token, cancel) =
            derive_child_with_deadline_hook(&parent, Duration::from_millis(50), move || {
                flag.store(true, Ordering::SeqCst);
            });

        cancel.cancel();
        assert!(token.is_cancelled());
        time::sleep(Duration::from_millis(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_reaches_deadline_child() {
        let parent = CancellationToken::new();
        let (token, _) = derive_child_with_deadline(&parent, Duration::from_secs(60));
        parent.cancel();
        assert!(token.is_cancelled());
    }
}
