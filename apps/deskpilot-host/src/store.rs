//! File-backed settings storage.
//!
//! Settings live in a single JSON object on disk, keyed by
//! `<scope>/<path>` the way [`modhub::settings::SettingService`] builds
//! keys. The whole object is rewritten after every mutation, which is
//! fine for the small settings sets modules keep.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use modhub::error::SettingsError;
use modhub::settings::SettingsBackend;

pub struct JsonFileBackend {
    path: PathBuf,
    items: RwLock<HashMap<String, Value>>,
}

impl JsonFileBackend {
    /// Opens the store at `path`, loading any existing content. A file
    /// that cannot be parsed is treated as empty rather than fatal so a
    /// corrupted settings file never keeps the host from starting.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let items = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<HashMap<String, Value>>(&text) {
                Ok(items) => items,
                Err(err) => {
                    warn!(path = %path.display(), %err, "settings file is not valid JSON, starting empty");
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(SettingsError::Backend(err.to_string())),
        };
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<(), SettingsError> {
        // Serialize under the lock, write without it.
        let json = serde_json::to_string_pretty(&*self.items.read())?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|err| SettingsError::Backend(err.to_string()))
    }
}

#[async_trait]
impl SettingsBackend for JsonFileBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.items.write().insert(key.to_owned(), value);
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.items.write().remove(key);
        self.flush().await
    }
}
