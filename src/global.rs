//! # Process-wide default root.
//!
//! [`default_root`] lazily creates one [`Root`] with [`Config::default`] on first access.
//! Once that root has been shut down, the next access replaces it with a fresh one.
//! [`reset_default_root`] drops the current default outright; it exists for tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::scopes::Root;

static DEFAULT_ROOT: Mutex<Option<Arc<Root>>> = parking_lot::const_mutex(None);

/// Returns the process-wide default root, creating it if absent or terminated.
///
/// The default root has no subscribers; build your own with [`Root::builder`] to observe
/// events.
pub fn default_root() -> Arc<Root> {
    let mut slot = DEFAULT_ROOT.lock();
    match slot.as_ref() {
        Some(root) if !root.is_terminated() => Arc::clone(root),
        _ => {
            let root = Root::new(Config::default());
            *slot = Some(Arc::clone(&root));
            root
        }
    }
}

/// Forgets the current default root.
///
/// Does not shut it down: handles already obtained keep working.
pub fn reset_default_root() {
    DEFAULT_ROOT.lock().take();
}
