//! Framework error taxonomy.
//!
//! These errors are transport-agnostic. Registry-table integrity errors
//! (duplicate or unknown module, double attachment) are programming errors
//! surfaced loudly at startup; call-path errors are reported to the specific
//! caller as the rejection of the single in-flight call.

use crate::transport::UiProcessHandle;
use thiserror::Error;

/// Errors raised by the module registry and module wiring.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A module with this id was already registered. Fatal at startup.
    #[error("module '{0}' was already added")]
    DuplicateModule(String),

    /// No module with this id is registered.
    #[error("no module with id '{0}'")]
    UnknownModule(String),

    /// The module exists but does not have the requested concrete type.
    #[error("module '{0}' does not implement the requested capability")]
    ModuleTypeMismatch(String),

    /// `attach` was called a second time on the same module runtime.
    #[error("module '{0}' is already attached to a registry")]
    AlreadyAttached(String),

    /// The module is not (or no longer) attached to a registry.
    #[error("module '{0}' is not attached to a registry")]
    NotAttached(String),

    /// A subscribed handle no longer resolves to a live UI process. Logged
    /// and purged during fan-out, never propagated to unrelated callers.
    #[error("subscriber {handle} of module '{module}' no longer resolves to a live UI process")]
    DeadSubscriber {
        module: String,
        handle: UiProcessHandle,
    },
}

/// Errors surfaced to a caller as the rejection of one in-flight call.
#[derive(Debug, Error)]
pub enum CallError {
    /// No module with this id is registered.
    #[error("no module with id '{0}'")]
    UnknownModule(String),

    /// The module has no handler registered under this method name.
    #[error("no method '{method}' registered on module '{module}'")]
    UnknownMethod { module: String, method: String },

    /// No handler is registered for this transport channel.
    #[error("no handler registered for channel '{0}'")]
    UnknownChannel(String),

    /// A call argument was missing or had the wrong shape.
    #[error("invalid argument at position {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    /// A persisted-settings operation behind the call failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A handler-thrown error; never crashes the host.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RegistryError> for CallError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownModule(id) => CallError::UnknownModule(id),
            other => CallError::Other(anyhow::Error::new(other)),
        }
    }
}

/// Errors from the persisted setting store collaborator.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The storage engine failed.
    #[error("settings backend failure: {0}")]
    Backend(String),

    /// A value could not be serialized for storage or transport.
    #[error("failed to serialize setting value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the message transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handle does not resolve to an attached UI process.
    #[error("no UI process for handle {0}")]
    UnknownUiProcess(UiProcessHandle),

    /// The UI process's event channel is gone.
    #[error("event channel for handle {0} is closed")]
    ChannelClosed(UiProcessHandle),
}

/// Errors raised when installing a reactive sync binding.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The reactive state has no field defined at this dot-path.
    #[error("no reactive field at path '{0}'")]
    UnknownPath(String),

    /// The module never bound a setting service.
    #[error("module has no bound setting service")]
    SettingsNotBound,

    /// `bind_settings` was called twice.
    #[error("module already has a bound setting service")]
    SettingsAlreadyBound,
}
