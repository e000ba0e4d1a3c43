//! Persisted setting store interfaces.
//!
//! The storage engine itself is an external collaborator; this module only
//! defines the key derivation (`<module_id>/<setting_path>`) and the
//! module-scoped access handle the sync layer is written against.

use crate::error::SettingsError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Namespaced get/set of JSON-serializable values.
#[async_trait]
pub trait SettingsBackend: Send + Sync + 'static {
    async fn read(&self, key: &str) -> Result<Option<Value>, SettingsError>;
    async fn write(&self, key: &str, value: Value) -> Result<(), SettingsError>;
    async fn remove(&self, key: &str) -> Result<(), SettingsError>;
}

/// A module-scoped view of the setting store. All keys are derived as
/// `<module_id>/<setting_path>`.
#[derive(Clone)]
pub struct SettingService {
    backend: Arc<dyn SettingsBackend>,
    scope: String,
}

impl SettingService {
    pub fn scoped(backend: Arc<dyn SettingsBackend>, module_id: impl Into<String>) -> Self {
        Self {
            backend,
            scope: module_id.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn key(&self, path: &str) -> String {
        format!("{}/{}", self.scope, path)
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>, SettingsError> {
        self.backend.read(&self.key(path)).await
    }

    pub async fn set(&self, path: &str, value: Value) -> Result<(), SettingsError> {
        self.backend.write(&self.key(path), value).await
    }

    pub async fn remove(&self, path: &str) -> Result<(), SettingsError> {
        self.backend.remove(&self.key(path)).await
    }
}

/// In-memory reference backend.
#[derive(Default)]
pub struct MemorySettingsBackend {
    items: RwLock<HashMap<String, Value>>,
}

impl MemorySettingsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, keyed by derived key.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.items.read().clone()
    }
}

#[async_trait]
impl SettingsBackend for MemorySettingsBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.items.write().remove(key);
        Ok(())
    }
}
