//! App Service Module
//!
//! Application-level state of the DeskPilot host: elevation status,
//! readiness, quit handling, and the user-facing application settings. The
//! settings are reactive fields mirrored to subscribed UI processes and
//! backed by the persisted store of the `storage` module.

use async_trait::async_trait;
use futures::future::BoxFuture;
use modhub::{setting_override, Module, ModuleRuntime, Prop, ReactiveState, SettingOutcome};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use storage_service::StorageModule;

/// Module id other modules and UI processes address this module by.
pub const MODULE_ID: &str = "app";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// A deferred step executed while the host is quitting.
pub type QuitTask = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Application state mirrored to UI processes.
pub struct AppState {
    /// Persisted user settings, addressed by dot-path.
    pub settings: ReactiveState,
    /// Whether the host runs elevated. Not persisted.
    pub is_administrator: Prop<bool>,
    pub ready: Prop<bool>,
    pub quitting: Prop<bool>,
}

impl AppState {
    fn new() -> Self {
        let settings = ReactiveState::new();
        settings.define("settings.close_strategy", json!("ask"));
        settings.define("settings.auto_launch", json!(false));
        settings.define("settings.log_level", json!("info"));
        Self {
            settings,
            is_administrator: Prop::new(false),
            ready: Prop::new(false),
            quitting: Prop::new(false),
        }
    }
}

pub struct AppModule {
    runtime: ModuleRuntime,
    pub state: AppState,
    quit_tasks: Mutex<Vec<QuitTask>>,
}

impl AppModule {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runtime: ModuleRuntime::new(MODULE_ID),
            state: AppState::new(),
            quit_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Queues a step to run while the host quits.
    pub fn add_quit_task<F>(&self, task: F)
    where
        F: FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + 'static,
    {
        self.quit_tasks.lock().push(Box::new(task));
    }

    /// Runs every queued quit task once, in order. A failing task is logged
    /// and does not stop the remaining tasks.
    pub async fn run_quit_tasks(&self) {
        self.state.quitting.set(true);
        let tasks: Vec<QuitTask> = std::mem::take(&mut *self.quit_tasks.lock());
        for task in tasks {
            if let Err(error) = task().await {
                tracing::warn!(%error, "quit task failed");
            }
        }
    }

    fn setup_state_sync(&self) {
        self.runtime
            .getter_sync("is-administrator", &self.state.is_administrator);
        self.runtime.getter_sync("ready", &self.state.ready);
        self.runtime.getter_sync("quitting", &self.state.quitting);
    }

    fn setup_settings(&self) -> anyhow::Result<()> {
        self.runtime
            .setting_sync(&self.state.settings, MODULE_ID, "settings.close_strategy", None)?;
        self.runtime
            .setting_sync(&self.state.settings, MODULE_ID, "settings.auto_launch", None)?;

        // Invalid levels are rejected outright: no assignment, no persist.
        self.runtime.setting_sync(
            &self.state.settings,
            MODULE_ID,
            "settings.log_level",
            Some(setting_override(|value, _service| async move {
                let valid = value
                    .as_str()
                    .is_some_and(|level| VALID_LOG_LEVELS.contains(&level));
                if valid {
                    Ok(SettingOutcome::Passthrough)
                } else {
                    tracing::warn!(?value, "rejected invalid log level");
                    Ok(SettingOutcome::Handled)
                }
            })),
        )?;
        Ok(())
    }

    fn setup_method_call(&self) {
        self.runtime.on_call_fn("get-app-version", |_args| async {
            Ok(Value::String(env!("CARGO_PKG_VERSION").to_string()))
        });
    }
}

#[async_trait]
impl Module for AppModule {
    fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    async fn setup(&self) -> anyhow::Result<()> {
        let storage = self
            .runtime
            .manager()?
            .get_module::<StorageModule>(storage_service::module::MODULE_ID)?;
        self.runtime
            .bind_settings(storage.settings_with(self.runtime.id()))?;

        self.setup_settings()?;
        self.setup_state_sync();
        self.setup_method_call();

        self.runtime.load_settings().await?;
        self.state.ready.set(true);
        tracing::info!("app module ready");
        Ok(())
    }

    async fn dispose(&self) -> anyhow::Result<()> {
        self.run_quit_tasks().await;
        self.runtime.shutdown();
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
