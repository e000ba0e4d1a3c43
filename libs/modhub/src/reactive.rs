//! In-process reactive state.
//!
//! The sync layer is generic over [`Observable`]: anything that can be read
//! on demand and watched for changes. [`Prop`] is the concrete cell used by
//! modules; [`ReactiveState`] is a path-keyed collection of JSON-valued
//! props, the rendering of "field at dot-path P of object O".
//!
//! Watch effects run synchronously inside the committing call, serialized
//! per cell by a commit lock. For a given cell this yields exactly one
//! notification per distinct committed value, in commit order. Effects must
//! not block on slow I/O and must not write to the cell they observe; slow
//! work is deferred and pushed back as a subsequent mutation.

use crate::dispose::Disposer;
use crate::error::SyncError;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Effect invoked with each newly committed value.
pub type WatchEffect<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A readable, watchable expression over in-process reactive state.
pub trait Observable: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Current value.
    fn get(&self) -> Self::Value;

    /// Registers a change effect; the returned disposer detaches it.
    fn watch(&self, effect: WatchEffect<Self::Value>) -> Disposer;
}

/// A reactive cell. Cloning shares the underlying cell.
pub struct Prop<T> {
    shared: Arc<PropShared<T>>,
}

struct PropShared<T> {
    value: RwLock<T>,
    watchers: Mutex<BTreeMap<u64, Arc<dyn Fn(&T) + Send + Sync>>>,
    // Serializes commit + notification so watchers observe transitions in
    // commit order.
    commit: Mutex<()>,
    next_watcher: AtomicU64,
}

impl<T> Clone for Prop<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            shared: Arc::new(PropShared {
                value: RwLock::new(initial),
                watchers: Mutex::new(BTreeMap::new()),
                commit: Mutex::new(()),
                next_watcher: AtomicU64::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.shared.value.read().clone()
    }

    /// Commits a new value. Returns `true` and notifies watchers only when
    /// the value actually changed.
    pub fn set(&self, next: T) -> bool {
        let _commit = self.shared.commit.lock();
        {
            let mut value = self.shared.value.write();
            if *value == next {
                return false;
            }
            *value = next.clone();
        }
        let watchers: Vec<Arc<dyn Fn(&T) + Send + Sync>> =
            self.shared.watchers.lock().values().cloned().collect();
        for watcher in watchers {
            watcher(&next);
        }
        true
    }
}

impl<T> Observable for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        Prop::get(self)
    }

    fn watch(&self, effect: WatchEffect<T>) -> Disposer {
        let key = self.shared.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.shared.watchers.lock().insert(key, Arc::from(effect));
        let shared = Arc::downgrade(&self.shared);
        Disposer::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.watchers.lock().remove(&key);
            }
        })
    }
}

/// A path-keyed collection of reactive JSON fields.
///
/// Modules define their observable state up front (`define`) and the sync
/// helpers address individual fields by dot-path, so one module can expose
/// many independently-addressable sub-fields without registering each by
/// hand. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct ReactiveState {
    props: Arc<RwLock<HashMap<String, Prop<Value>>>>,
}

impl ReactiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a field at `path` with a default value. Defining an existing
    /// path returns the existing field untouched.
    pub fn define(&self, path: &str, default: Value) -> Prop<Value> {
        self.props
            .write()
            .entry(path.to_string())
            .or_insert_with(|| Prop::new(default))
            .clone()
    }

    /// The field at `path`, if defined.
    pub fn prop(&self, path: &str) -> Option<Prop<Value>> {
        self.props.read().get(path).cloned()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.prop(path).map(|p| p.get())
    }

    /// Commits a new value at `path`. Returns whether the value changed.
    pub fn set(&self, path: &str, value: Value) -> Result<bool, SyncError> {
        let prop = self
            .prop(path)
            .ok_or_else(|| SyncError::UnknownPath(path.to_string()))?;
        Ok(prop.set(value))
    }
}
