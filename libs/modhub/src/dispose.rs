//! One-shot teardown handles for reactive bindings and channel handlers.

use parking_lot::Mutex;
use std::fmt;

/// An idempotent one-shot teardown action.
///
/// Every reactive binding and transport handler registration hands back one
/// of these. Disposal runs the action at most once; re-disposing is a no-op,
/// which guards re-entrant teardown during shutdown races. Dropping a
/// `Disposer` without calling [`Disposer::dispose`] leaks the binding on
/// purpose: owners (module runtimes, the registry) track and drain their
/// disposers explicitly.
pub struct Disposer(Mutex<Option<Box<dyn FnOnce() + Send>>>);

impl Disposer {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Mutex::new(Some(Box::new(f))))
    }

    /// A disposer with nothing to tear down.
    pub fn noop() -> Self {
        Self(Mutex::new(None))
    }

    /// Runs the teardown action if it has not run yet.
    pub fn dispose(&self) {
        let action = self.0.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.lock().is_none()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Disposer")
            .field(&if self.is_disposed() { "disposed" } else { "armed" })
            .finish()
    }
}
