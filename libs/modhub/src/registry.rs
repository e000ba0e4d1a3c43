//! Process-wide module directory, call dispatch and event fan-out.

use crate::channel;
use crate::dispose::Disposer;
use crate::error::{CallError, RegistryError};
use crate::module::{arg, Module};
use crate::transport::{ModuleEvent, Transport, UiProcessHandle};
use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

/// The process-wide directory of modules: per-module subscriber tracking,
/// call dispatch, and event fan-out. One registry is constructed at host
/// startup and injected into every module at registration.
///
/// Cloning shares the same registry.
#[derive(Clone)]
pub struct ModuleRegistry {
    shared: Arc<RegistryShared>,
}

pub(crate) struct RegistryShared {
    transport: Arc<dyn Transport>,
    table: RwLock<ModuleTable>,
    standing: Mutex<Vec<Disposer>>,
}

#[derive(Default)]
struct ModuleTable {
    // Registration order drives setup/dispose ordering.
    order: Vec<Arc<ModuleEntry>>,
    by_id: HashMap<String, Arc<ModuleEntry>>,
}

struct ModuleEntry {
    id: String,
    module: Arc<dyn Module>,
    subscribers: Mutex<HashSet<UiProcessHandle>>,
}

impl ModuleRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                transport,
                table: RwLock::new(ModuleTable::default()),
                standing: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<RegistryShared>) -> Self {
        Self { shared }
    }

    /// Registers a module. Must be called before [`ModuleRegistry::setup`];
    /// a duplicate id is a fatal configuration error and leaves the
    /// offending module unregistered.
    pub fn use_module(&self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let id = module.id().to_string();
        let mut table = self.shared.table.write();
        if table.by_id.contains_key(&id) {
            return Err(RegistryError::DuplicateModule(id));
        }
        module.runtime().attach(&self.shared)?;
        let entry = Arc::new(ModuleEntry {
            id: id.clone(),
            module,
            subscribers: Mutex::new(HashSet::new()),
        });
        table.order.push(entry.clone());
        table.by_id.insert(id, entry);
        Ok(())
    }

    /// Looks up a module by id and casts it to the caller's expected
    /// concrete type. Identity is the only runtime check; requesting the
    /// wrong type is a programming error surfaced as
    /// [`RegistryError::ModuleTypeMismatch`].
    pub fn get_module<T: Module>(&self, id: &str) -> Result<Arc<T>, RegistryError> {
        let entry = self
            .shared
            .entry(id)
            .ok_or_else(|| RegistryError::UnknownModule(id.to_string()))?;
        entry
            .module
            .clone()
            .as_any()
            .downcast::<T>()
            .map_err(|_| RegistryError::ModuleTypeMismatch(id.to_string()))
    }

    /// Existence probe, no side effects.
    pub fn has_module(&self, id: &str) -> bool {
        self.shared.table.read().by_id.contains_key(id)
    }

    /// Installs the standing transport handlers, then runs every module's
    /// `setup` sequentially in registration order. A slow module blocks all
    /// subsequent modules on purpose: dependents may rely on earlier
    /// modules being fully initialized. The first failure aborts boot.
    pub async fn setup(&self) -> anyhow::Result<()> {
        self.install_standing_handlers();

        let modules: Vec<Arc<dyn Module>> = {
            let table = self.shared.table.read();
            table.order.iter().map(|e| e.module.clone()).collect()
        };
        for module in modules {
            module
                .setup()
                .await
                .with_context(|| format!("setup of module '{}' failed", module.id()))?;
            tracing::debug!(module = %module.id(), "module ready");
        }
        Ok(())
    }

    /// Disposes every module in registration order, then removes the
    /// standing handlers. Per-module teardown failures are logged and do
    /// not prevent the remaining modules from tearing down.
    pub async fn dispose(&self) {
        let modules: Vec<Arc<dyn Module>> = {
            let table = self.shared.table.read();
            table.order.iter().map(|e| e.module.clone()).collect()
        };
        for module in modules {
            if let Err(error) = module.dispose().await {
                tracing::warn!(module = %module.id(), %error, "module dispose failed");
            }
        }

        let standing: Vec<Disposer> = std::mem::take(&mut *self.shared.standing.lock());
        for slot in standing {
            slot.dispose();
        }
    }

    /// Fans an event out to every UI process currently subscribed to
    /// `module_id`. Handles that no longer resolve to a live UI process are
    /// logged and purged; delivery continues to the remaining subscribers.
    pub fn send_event(
        &self,
        module_id: &str,
        event: &str,
        args: Vec<Value>,
    ) -> Result<(), RegistryError> {
        self.shared.send_event(module_id, event, args)
    }

    /// Adds `caller` to the module's subscriber set.
    pub fn subscribe(
        &self,
        caller: UiProcessHandle,
        module_id: &str,
    ) -> Result<(), RegistryError> {
        let entry = self
            .shared
            .entry(module_id)
            .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))?;
        entry.subscribers.lock().insert(caller);
        Ok(())
    }

    /// Removes `caller` from the module's subscriber set. Removing an
    /// absent handle is a no-op.
    pub fn unsubscribe(
        &self,
        caller: UiProcessHandle,
        module_id: &str,
    ) -> Result<(), RegistryError> {
        let entry = self
            .shared
            .entry(module_id)
            .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))?;
        entry.subscribers.lock().remove(&caller);
        Ok(())
    }

    /// Current subscribers of a module, in no particular order.
    pub fn subscribers(&self, module_id: &str) -> Result<Vec<UiProcessHandle>, RegistryError> {
        let entry = self
            .shared
            .entry(module_id)
            .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))?;
        let subscribers = entry.subscribers.lock();
        Ok(subscribers.iter().copied().collect())
    }

    fn install_standing_handlers(&self) {
        let transport = self.shared.transport.clone();
        let mut standing = self.shared.standing.lock();

        // subscribe(module_id)
        let weak = Arc::downgrade(&self.shared);
        standing.push(transport.on_call(
            channel::SUBSCRIBE_CHANNEL,
            Arc::new(move |caller, args| {
                let weak = weak.clone();
                Box::pin(async move {
                    let shared = upgrade(&weak)?;
                    let module_id: String = arg(&args, 0)?;
                    ModuleRegistry::from_shared(shared).subscribe(caller, &module_id)?;
                    Ok(Value::Null)
                })
            }),
        ));

        // unsubscribe(module_id)
        let weak = Arc::downgrade(&self.shared);
        standing.push(transport.on_call(
            channel::UNSUBSCRIBE_CHANNEL,
            Arc::new(move |caller, args| {
                let weak = weak.clone();
                Box::pin(async move {
                    let shared = upgrade(&weak)?;
                    let module_id: String = arg(&args, 0)?;
                    ModuleRegistry::from_shared(shared).unsubscribe(caller, &module_id)?;
                    Ok(Value::Null)
                })
            }),
        ));

        // call(module_id, method, ...args), best effort: an unresolved
        // module or method yields null instead of a rejection, so UI builds
        // can probe for features that are not present on this host.
        let weak = Arc::downgrade(&self.shared);
        standing.push(transport.on_call(
            channel::CALL_CHANNEL,
            Arc::new(move |_caller, args| {
                let weak = weak.clone();
                Box::pin(async move {
                    let Some(shared) = weak.upgrade() else {
                        return Ok(Value::Null);
                    };
                    let module_id: String = arg(&args, 0)?;
                    let method: String = arg(&args, 1)?;
                    let rest = args.get(2..).unwrap_or(&[]).to_vec();

                    let Some(entry) = shared.entry(&module_id) else {
                        tracing::debug!(module = %module_id, %method, "invoke for unregistered module ignored");
                        return Ok(Value::Null);
                    };
                    match entry.module.runtime().dispatch_call(&method, rest).await {
                        Err(CallError::UnknownMethod { module, method }) => {
                            tracing::debug!(%module, %method, "invoke for unknown method ignored");
                            Ok(Value::Null)
                        }
                        other => other,
                    }
                })
            }),
        ));

        // A destroyed UI process is removed from every module's subscriber
        // set, independent of explicit unsubscribe.
        let weak = Arc::downgrade(&self.shared);
        standing.push(transport.on_ui_destroyed(Arc::new(move |handle| {
            if let Some(shared) = weak.upgrade() {
                let entries: Vec<Arc<ModuleEntry>> = shared.table.read().order.clone();
                for entry in entries {
                    if entry.subscribers.lock().remove(&handle) {
                        tracing::debug!(module = %entry.id, %handle, "subscriber removed on UI destruction");
                    }
                }
            }
        })));
    }
}

impl RegistryShared {
    fn entry(&self, id: &str) -> Option<Arc<ModuleEntry>> {
        self.table.read().by_id.get(id).cloned()
    }

    fn send_event(
        &self,
        module_id: &str,
        event: &str,
        args: Vec<Value>,
    ) -> Result<(), RegistryError> {
        let entry = self
            .entry(module_id)
            .ok_or_else(|| RegistryError::UnknownModule(module_id.to_string()))?;
        let targets: Vec<UiProcessHandle> = entry.subscribers.lock().iter().copied().collect();

        let mut stale: Vec<UiProcessHandle> = Vec::new();
        for handle in targets {
            if !self.transport.is_live(handle) {
                stale.push(handle);
                continue;
            }
            let payload = ModuleEvent {
                module_id: module_id.to_string(),
                event: event.to_string(),
                args: args.clone(),
            };
            if self.transport.send_event(handle, payload).is_err() {
                stale.push(handle);
            }
        }

        if !stale.is_empty() {
            let mut subscribers = entry.subscribers.lock();
            for handle in stale {
                subscribers.remove(&handle);
                let dead = RegistryError::DeadSubscriber {
                    module: module_id.to_string(),
                    handle,
                };
                // Indicates the destruction notification lost the race with
                // this send; purge rather than propagate.
                tracing::warn!(error = %dead, "purged dead subscriber");
            }
        }
        Ok(())
    }
}

fn upgrade(weak: &Weak<RegistryShared>) -> Result<Arc<RegistryShared>, CallError> {
    weak.upgrade()
        .ok_or_else(|| CallError::Other(anyhow::anyhow!("module registry is gone")))
}
