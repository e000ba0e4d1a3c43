//! Reactive sync layer: getter sync, dot-prop sync, persisted-setting sync.
//!
//! Each helper turns an in-process reactive value into a push channel that
//! emits on change and a pull channel that returns the current value on
//! demand. Setting sync additionally backs the field with the persisted
//! store: the stored value (or the field's default) is resolved and applied
//! before the push/pull pair starts observing, so no change triggered by
//! the initial load is missed or double-counted, and a default is never
//! clobbered by a racing write.
//!
//! Every binding lands in the owning runtime's disposal set and is torn
//! down exactly once when the module is disposed.

use crate::channel::ChannelId;
use crate::error::{CallError, SettingsError, SyncError};
use crate::module::ModuleRuntime;
use crate::reactive::{Observable, Prop, ReactiveState, WatchEffect};
use crate::settings::SettingService;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What a custom setting setter did with the incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingOutcome {
    /// The override took full responsibility; the framework performs no
    /// field assignment and no persistence.
    Handled,
    /// Fall through to the default behavior.
    Passthrough,
}

/// Custom setter hook for a persisted setting. Runs before the default
/// behavior for both the initial load and every `set-setting` request.
pub type SettingOverride =
    Arc<dyn Fn(Value, SettingService) -> BoxFuture<'static, Result<SettingOutcome, CallError>> + Send + Sync>;

/// Wraps a plain async closure as a [`SettingOverride`].
pub fn setting_override<F, Fut>(f: F) -> SettingOverride
where
    F: Fn(Value, SettingService) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<SettingOutcome, CallError>> + Send + 'static,
{
    Arc::new(move |value, service| Box::pin(f(value, service)))
}

/// Whether an applied value is written back to the store. Values resolved
/// *from* the store are not written back; defaults and external writes are.
#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteBack {
    Persist,
    Skip,
}

type ApplyFn = Arc<dyn Fn(Value, WriteBack) -> BoxFuture<'static, Result<(), CallError>> + Send + Sync>;

impl ModuleRuntime {
    /// Binds the module-scoped setting service. Called once during module
    /// setup, before any setting sync helper.
    pub fn bind_settings(&self, service: SettingService) -> Result<(), SyncError> {
        self.inner_settings()
            .set(service)
            .map_err(|_| SyncError::SettingsAlreadyBound)
    }

    /// The bound setting service.
    pub fn settings(&self) -> Result<SettingService, SyncError> {
        self.inner_settings()
            .get()
            .cloned()
            .ok_or(SyncError::SettingsNotBound)
    }

    /// Watches an observable and tracks the binding for disposal.
    pub fn auto_dispose_watch<O: Observable>(&self, source: &O, effect: WatchEffect<O::Value>) {
        self.add_disposer(source.watch(effect));
    }

    /// Mirrors an observable under `resource`: pushes
    /// `update-getter/<resource>` on change, answers
    /// `get-getter/<resource>` with the current value.
    pub fn getter_sync<O>(&self, resource: &str, source: &O)
    where
        O: Observable + Clone,
        O::Value: Serialize,
    {
        let update = ChannelId::UpdateGetter { resource }.name();
        let runtime = self.clone();
        self.auto_dispose_watch(
            source,
            Box::new(move |value: &O::Value| push_update(&runtime, &update, value)),
        );

        let pull = source.clone();
        self.on_call_fn(ChannelId::GetGetter { resource }.name(), move |_args| {
            let result = serde_json::to_value(pull.get())
                .map_err(|e| CallError::Settings(SettingsError::Serialize(e)));
            async move { result }
        });
    }

    /// Mirrors the field at `path` of a [`ReactiveState`] under channels
    /// namespaced by `sync_id` and the path.
    pub fn dot_prop_sync(
        &self,
        state: &ReactiveState,
        sync_id: &str,
        path: &str,
    ) -> Result<(), SyncError> {
        let prop = state
            .prop(path)
            .ok_or_else(|| SyncError::UnknownPath(path.to_string()))?;
        self.install_dot_prop(prop, sync_id, path);
        Ok(())
    }

    fn install_dot_prop(&self, prop: Prop<Value>, sync_id: &str, path: &str) {
        let update = ChannelId::UpdateDotProp { sync_id, path }.name();
        let runtime = self.clone();
        self.auto_dispose_watch(
            &prop,
            Box::new(move |value: &Value| push_update(&runtime, &update, value)),
        );

        let pull = prop.clone();
        self.on_call_fn(ChannelId::GetDotProp { sync_id, path }.name(), move |_args| {
            let value = pull.get();
            async move { Ok(value) }
        });
    }

    /// Backs the field at `path` with the persisted store.
    ///
    /// At setup time the stored value for `(module_id, path)` is read,
    /// falling back to the field's current value; the resolved value is
    /// applied through `override_setter` (or the default setter: assign the
    /// field, persist when the value did not come from the store), and only
    /// then does the dot-prop push/pull pair start observing. Each initial
    /// load is captured as a pending task awaited by
    /// [`ModuleRuntime::load_settings`].
    ///
    /// Every subsequent `set-setting/<sync_id>/<path>` request routes
    /// through the same setter; [`SettingOutcome::Handled`] suppresses the
    /// default behavior entirely.
    pub fn setting_sync(
        &self,
        state: &ReactiveState,
        sync_id: &str,
        path: &str,
        override_setter: Option<SettingOverride>,
    ) -> Result<(), SyncError> {
        let prop = state
            .prop(path)
            .ok_or_else(|| SyncError::UnknownPath(path.to_string()))?;
        let service = self.settings()?;

        let apply = default_apply(prop.clone(), service.clone(), override_setter, path);
        self.on_set_setting(
            ChannelId::SetSetting {
                sync_id: Some(sync_id),
                path,
            },
            apply.clone(),
        );

        let runtime = self.clone();
        let sync_id = sync_id.to_string();
        let path = path.to_string();
        self.push_pending(Box::pin(async move {
            match service.get(&path).await? {
                Some(stored) => apply(stored, WriteBack::Skip).await?,
                None => apply(prop.get(), WriteBack::Persist).await?,
            }
            runtime.install_dot_prop(prop, &sync_id, &path);
            Ok(())
        }));
        Ok(())
    }

    /// Getter-backed setting sync for state that is not path-addressable.
    ///
    /// `setter` is responsible for applying the value to the module's
    /// state; the framework persists it afterwards unless the setter
    /// returns [`SettingOutcome::Handled`]. The resource is mirrored under
    /// `settings/<name>` once the initial load resolved, and external
    /// writes arrive on `set-setting/<name>`.
    pub fn simple_setting_sync<O>(
        &self,
        name: &str,
        source: &O,
        setter: SettingOverride,
    ) -> Result<(), SyncError>
    where
        O: Observable + Clone,
        O::Value: Serialize,
    {
        let service = self.settings()?;

        let apply: ApplyFn = {
            let service = service.clone();
            let path = name.to_string();
            Arc::new(move |value, write_back| {
                let setter = setter.clone();
                let service = service.clone();
                let path = path.clone();
                Box::pin(async move {
                    if matches!(
                        setter(value.clone(), service.clone()).await?,
                        SettingOutcome::Handled
                    ) {
                        return Ok(());
                    }
                    if write_back == WriteBack::Persist {
                        service.set(&path, value).await?;
                    }
                    Ok(())
                })
            })
        };

        self.on_set_setting(
            ChannelId::SetSetting {
                sync_id: None,
                path: name,
            },
            apply.clone(),
        );

        let runtime = self.clone();
        let source = source.clone();
        let name = name.to_string();
        self.push_pending(Box::pin(async move {
            match service.get(&name).await? {
                Some(stored) => apply(stored, WriteBack::Skip).await?,
                None => {
                    let default = serde_json::to_value(source.get())
                        .map_err(SettingsError::Serialize)?;
                    apply(default, WriteBack::Persist).await?;
                }
            }
            runtime.getter_sync(&format!("settings/{name}"), &source);
            Ok(())
        }));
        Ok(())
    }

    /// Awaits every pending initial setting load. Modules call this at the
    /// end of `setup`, so dependents can rely on settings being loaded once
    /// a module's setup resolves. The loads run concurrently.
    pub async fn load_settings(&self) -> Result<(), CallError> {
        let pending: Vec<_> = {
            let mut lock = self.pending_settings_mut();
            lock.drain(..).collect()
        };
        futures::future::try_join_all(pending).await?;
        Ok(())
    }

    fn on_set_setting(&self, channel: ChannelId<'_>, apply: ApplyFn) {
        self.on_call_fn(channel.name(), move |args| {
            let apply = apply.clone();
            async move {
                let value = args.into_iter().next().unwrap_or(Value::Null);
                apply(value, WriteBack::Persist).await?;
                Ok(Value::Null)
            }
        });
    }
}

/// Default setter pipeline for a path-keyed persisted setting: run the
/// override if any, then assign the field and persist.
fn default_apply(
    prop: Prop<Value>,
    service: SettingService,
    override_setter: Option<SettingOverride>,
    path: &str,
) -> ApplyFn {
    let path = path.to_string();
    Arc::new(move |value, write_back| {
        let prop = prop.clone();
        let service = service.clone();
        let override_setter = override_setter.clone();
        let path = path.clone();
        Box::pin(async move {
            if let Some(setter) = override_setter {
                if matches!(
                    setter(value.clone(), service.clone()).await?,
                    SettingOutcome::Handled
                ) {
                    return Ok(());
                }
            }
            prop.set(value.clone());
            if write_back == WriteBack::Persist {
                service.set(&path, value).await?;
            }
            Ok(())
        })
    })
}

fn push_update<T: Serialize>(runtime: &ModuleRuntime, channel: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => {
            if let Err(error) = runtime.send_event(channel, vec![value]) {
                tracing::warn!(channel, %error, "failed to push update event");
            }
        }
        Err(error) => tracing::warn!(channel, %error, "failed to serialize update value"),
    }
}
