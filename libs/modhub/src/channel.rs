//! Structured channel identifiers.
//!
//! Call and event channel names are derived from module resources
//! (`update-getter/<resource>`, `set-setting/<sync-id>/<path>`, ...). The
//! mapping is kept as a tagged enum in-process and rendered to a string only
//! at the transport boundary, so the naming scheme is type-checked instead
//! of relying on string-template discipline.

use std::fmt;

/// Standing channel on which UI processes subscribe to a module.
pub const SUBSCRIBE_CHANNEL: &str = "module-registry/subscribe";
/// Standing channel on which UI processes unsubscribe from a module.
pub const UNSUBSCRIBE_CHANNEL: &str = "module-registry/unsubscribe";
/// Standing channel for generic module method invocation.
pub const CALL_CHANNEL: &str = "module-registry/call";
/// Event channel that carries `(module_id, event, args)` tuples to a UI
/// process on wire transports.
pub const EVENT_CHANNEL: &str = "module-registry/event";

/// A resource-derived call or event channel of the reactive sync layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId<'a> {
    /// Pull channel returning a getter-synced resource's current value.
    GetGetter { resource: &'a str },
    /// Push channel emitting a getter-synced resource on change.
    UpdateGetter { resource: &'a str },
    /// Pull channel returning the current value at a dot-path.
    GetDotProp { sync_id: &'a str, path: &'a str },
    /// Push channel emitting a dot-path field on change.
    UpdateDotProp { sync_id: &'a str, path: &'a str },
    /// Write channel applying a new value to a persisted setting. Path-keyed
    /// settings carry their sync id; getter-backed settings do not.
    SetSetting {
        sync_id: Option<&'a str>,
        path: &'a str,
    },
}

impl ChannelId<'_> {
    /// Renders the wire name of this channel.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChannelId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetGetter { resource } => write!(f, "get-getter/{resource}"),
            Self::UpdateGetter { resource } => write!(f, "update-getter/{resource}"),
            Self::GetDotProp { sync_id, path } => write!(f, "get-dot-prop/{sync_id}/{path}"),
            Self::UpdateDotProp { sync_id, path } => {
                write!(f, "update-dot-prop/{sync_id}/{path}")
            }
            Self::SetSetting {
                sync_id: Some(sync_id),
                path,
            } => write!(f, "set-setting/{sync_id}/{path}"),
            Self::SetSetting {
                sync_id: None,
                path,
            } => write!(f, "set-setting/{path}"),
        }
    }
}
