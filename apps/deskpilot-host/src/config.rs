//! Host configuration loaded from a YAML file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Top-level configuration for the host process.
///
/// Every field has a default so a missing or empty file still yields a
/// usable configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Path of the JSON file that backs module settings.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,

    /// Default tracing filter, overridable via `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("deskpilot-settings.json")
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            log_filter: default_log_filter(),
        }
    }
}

impl HostConfig {
    /// Reads the configuration from `path`. A missing file is not an
    /// error; the defaults apply.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}
