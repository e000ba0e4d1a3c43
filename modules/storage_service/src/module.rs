//! Module declaration and lifecycle implementation.

use async_trait::async_trait;
use modhub::{arg, Module, ModuleRuntime, SettingService, SettingsBackend};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

/// Module id other modules use to look the storage module up.
pub const MODULE_ID: &str = "storage";

/// The persisted-settings module.
///
/// The storage engine behind it is injected at construction; the module
/// itself only vends scoped views and the raw call surface.
pub struct StorageModule {
    runtime: ModuleRuntime,
    backend: Arc<dyn SettingsBackend>,
}

impl StorageModule {
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Arc<Self> {
        Arc::new(Self {
            runtime: ModuleRuntime::new(MODULE_ID),
            backend,
        })
    }

    /// A setting service namespaced to `module_id`. This is what dependent
    /// modules bind during their setup.
    pub fn settings_with(&self, module_id: impl Into<String>) -> SettingService {
        SettingService::scoped(self.backend.clone(), module_id)
    }
}

#[async_trait]
impl Module for StorageModule {
    fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    async fn setup(&self) -> anyhow::Result<()> {
        // Raw item access for UI processes. Keys are fully qualified
        // (`<module>/<path>`), no scoping is applied here.
        let backend = self.backend.clone();
        self.runtime.on_call_fn("get-item", move |args| {
            let backend = backend.clone();
            async move {
                let key: String = arg(&args, 0)?;
                let value = backend.read(&key).await?;
                Ok(value.unwrap_or(Value::Null))
            }
        });

        let backend = self.backend.clone();
        self.runtime.on_call_fn("set-item", move |args| {
            let backend = backend.clone();
            async move {
                let key: String = arg(&args, 0)?;
                let value = args.get(1).cloned().unwrap_or(Value::Null);
                backend.write(&key, value).await?;
                Ok(Value::Null)
            }
        });

        let backend = self.backend.clone();
        self.runtime.on_call_fn("remove-item", move |args| {
            let backend = backend.clone();
            async move {
                let key: String = arg(&args, 0)?;
                backend.remove(&key).await?;
                Ok(Value::Null)
            }
        });

        tracing::info!("storage module ready");
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
