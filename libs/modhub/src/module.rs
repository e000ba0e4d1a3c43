//! Module base contract: identity, lifecycle, the private method table.

use crate::dispose::Disposer;
use crate::error::{CallError, RegistryError};
use crate::registry::{ModuleRegistry, RegistryShared};
use crate::settings::SettingService;
use crate::transport::CallFuture;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

/// Handler in a module's private method table.
pub type MethodHandler = Arc<dyn Fn(Vec<Value>) -> CallFuture + Send + Sync>;

/// The unit the registry manages.
///
/// A module carries a stable string identity, an async lifecycle, and a
/// [`ModuleRuntime`] holding its method table and reactive bindings. `setup`
/// runs in registration order and may look up dependency modules through
/// the registry; its failure aborts host startup. `dispose` must release
/// everything the module created and be safe to call even if `setup`
/// partially failed; the default implementation drains the runtime's
/// disposal set, and overrides should end with [`ModuleRuntime::shutdown`].
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// The runtime created by this module at construction.
    fn runtime(&self) -> &ModuleRuntime;

    /// Process-unique, immutable identity.
    fn id(&self) -> &str {
        self.runtime().id()
    }

    async fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn dispose(&self) -> anyhow::Result<()> {
        self.runtime().shutdown();
        Ok(())
    }

    /// Capability cast hook for [`ModuleRegistry::get_module`]. Implement as
    /// `fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Per-module state managed on behalf of a [`Module`] implementation:
/// registry attachment, the method table, the disposal set for reactive
/// bindings, and pending setting loads. Cloning shares the same runtime.
#[derive(Clone)]
pub struct ModuleRuntime {
    inner: Arc<RuntimeInner>,
}

pub(crate) struct RuntimeInner {
    id: String,
    manager: OnceLock<Weak<RegistryShared>>,
    methods: RwLock<HashMap<String, MethodHandler>>,
    disposers: Mutex<Vec<Disposer>>,
    pending_settings: Mutex<Vec<BoxFuture<'static, Result<(), CallError>>>>,
    settings: OnceLock<SettingService>,
}

impl ModuleRuntime {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                id: id.into(),
                manager: OnceLock::new(),
                methods: RwLock::new(HashMap::new()),
                disposers: Mutex::new(Vec::new()),
                pending_settings: Mutex::new(Vec::new()),
                settings: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Called exactly once by the registry at registration time.
    pub(crate) fn attach(&self, shared: &Arc<RegistryShared>) -> Result<(), RegistryError> {
        self.inner
            .manager
            .set(Arc::downgrade(shared))
            .map_err(|_| RegistryError::AlreadyAttached(self.inner.id.clone()))
    }

    /// The registry this module is registered with. This is the sole
    /// dependency-injection mechanism between modules.
    pub fn manager(&self) -> Result<ModuleRegistry, RegistryError> {
        self.inner
            .manager
            .get()
            .and_then(Weak::upgrade)
            .map(ModuleRegistry::from_shared)
            .ok_or_else(|| RegistryError::NotAttached(self.inner.id.clone()))
    }

    /// Registers a handler in the method table. Re-registering the same
    /// name overwrites silently; the sync helpers rely on last-wins when
    /// re-installing a conceptual channel under a fresh name.
    pub fn on_call(&self, method: impl Into<String>, handler: MethodHandler) {
        self.inner.methods.write().insert(method.into(), handler);
    }

    /// Like [`ModuleRuntime::on_call`], for plain async closures.
    pub fn on_call_fn<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        self.on_call(
            method,
            Arc::new(move |args| -> CallFuture { Box::pin(f(args)) }),
        );
    }

    /// Looks up and invokes a registered handler, returning its result as
    /// the single response.
    pub async fn dispatch_call(&self, method: &str, args: Vec<Value>) -> Result<Value, CallError> {
        let handler = self
            .inner
            .methods
            .read()
            .get(method)
            .cloned()
            .ok_or_else(|| CallError::UnknownMethod {
                module: self.inner.id.clone(),
                method: method.to_string(),
            })?;
        handler(args).await
    }

    /// Emits an event to every UI process currently subscribed to this
    /// module, via the registry's fan-out.
    pub fn send_event(&self, event: impl Into<String>, args: Vec<Value>) -> Result<(), RegistryError> {
        self.manager()?.send_event(self.id(), &event.into(), args)
    }

    /// Tracks a reactive binding for disposal at shutdown.
    pub fn add_disposer(&self, disposer: Disposer) {
        self.inner.disposers.lock().push(disposer);
    }

    pub(crate) fn push_pending(&self, load: BoxFuture<'static, Result<(), CallError>>) {
        self.inner.pending_settings.lock().push(load);
    }

    pub(crate) fn inner_settings(&self) -> &OnceLock<SettingService> {
        &self.inner.settings
    }

    pub(crate) fn pending_settings_mut(
        &self,
    ) -> parking_lot::MutexGuard<'_, Vec<BoxFuture<'static, Result<(), CallError>>>> {
        self.inner.pending_settings.lock()
    }

    /// Releases every tracked binding exactly once. Safe to call again; a
    /// drained runtime has nothing left to release.
    pub fn shutdown(&self) {
        let disposers: Vec<Disposer> = std::mem::take(&mut *self.inner.disposers.lock());
        for disposer in disposers {
            disposer.dispose();
        }
        self.inner.pending_settings.lock().clear();
    }
}

/// Extracts and deserializes the call argument at `index`. A missing
/// argument reads as JSON null.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> Result<T, CallError> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| CallError::InvalidArgument {
        index,
        reason: e.to_string(),
    })
}
