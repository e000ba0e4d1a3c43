//! Shared fixtures: an in-process harness, test modules, and a counting
//! settings backend.

use async_trait::async_trait;
use modhub::{
    setting_override, CallError, LoopbackTransport, MemorySettingsBackend, Module, ModuleEvent,
    ModuleRegistry, ModuleRuntime, Prop, ReactiveState, SettingOutcome, SettingOverride,
    SettingService, SettingsBackend, SettingsError,
};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// A loopback transport wired to a fresh registry.
pub struct Harness {
    pub transport: LoopbackTransport,
    pub registry: ModuleRegistry,
}

impl Harness {
    pub fn new() -> Self {
        let transport = LoopbackTransport::new();
        let registry = ModuleRegistry::new(Arc::new(transport.clone()));
        Self {
            transport,
            registry,
        }
    }
}

/// Drains everything currently queued in a UI mailbox.
pub fn drain_events(rx: &mut UnboundedReceiver<ModuleEvent>) -> Vec<ModuleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Minimal module exposing one getter-synced counter and an `echo` method.
pub struct CounterModule {
    runtime: ModuleRuntime,
    pub foo: Prop<i64>,
}

impl CounterModule {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            runtime: ModuleRuntime::new(id),
            foo: Prop::new(0),
        })
    }
}

#[async_trait]
impl Module for CounterModule {
    fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    async fn setup(&self) -> anyhow::Result<()> {
        self.runtime.getter_sync("foo", &self.foo);
        self.runtime.on_call_fn("echo", |args| async move {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        });
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Settings backend that counts writes, for asserting load-before-observe
/// write behavior.
#[derive(Default)]
pub struct CountingBackend {
    inner: MemorySettingsBackend,
    writes: AtomicUsize,
}

impl CountingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a stored value without counting it as a write.
    pub async fn seed(&self, key: &str, value: Value) {
        let _ = self.inner.write(key, value).await;
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, key: &str) -> Option<Value> {
        self.inner.read(key).await.ok().flatten()
    }
}

#[async_trait]
impl SettingsBackend for CountingBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.inner.remove(key).await
    }
}

/// Module exercising both persisted-setting sync flavors: a path-keyed
/// `settings.close_strategy` (optionally override-guarded) and a
/// getter-backed `timeout`.
pub struct PrefsModule {
    runtime: ModuleRuntime,
    pub state: ReactiveState,
    pub timeout: Prop<i64>,
    backend: Arc<CountingBackend>,
    close_strategy_override: Option<SettingOverride>,
}

impl PrefsModule {
    pub fn new(backend: Arc<CountingBackend>) -> Arc<Self> {
        Self::with_override(backend, None)
    }

    pub fn with_override(
        backend: Arc<CountingBackend>,
        close_strategy_override: Option<SettingOverride>,
    ) -> Arc<Self> {
        let state = ReactiveState::new();
        state.define("settings.close_strategy", json!("ask"));
        Arc::new(Self {
            runtime: ModuleRuntime::new("prefs"),
            state,
            timeout: Prop::new(10),
            backend,
            close_strategy_override,
        })
    }
}

#[async_trait]
impl Module for PrefsModule {
    fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    async fn setup(&self) -> anyhow::Result<()> {
        self.runtime.bind_settings(SettingService::scoped(
            self.backend.clone(),
            self.runtime.id(),
        ))?;

        self.runtime.setting_sync(
            &self.state,
            "prefs",
            "settings.close_strategy",
            self.close_strategy_override.clone(),
        )?;

        let timeout = self.timeout.clone();
        self.runtime.simple_setting_sync(
            "timeout",
            &self.timeout,
            setting_override(move |value, _service| {
                let timeout = timeout.clone();
                async move {
                    let parsed: i64 =
                        serde_json::from_value(value).map_err(|e| CallError::InvalidArgument {
                            index: 0,
                            reason: e.to_string(),
                        })?;
                    timeout.set(parsed);
                    Ok(SettingOutcome::Passthrough)
                }
            }),
        )?;

        self.runtime.load_settings().await?;
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
