//! Message transport abstraction.
//!
//! The transport is an external collaborator: a bidirectional call channel
//! (request to single response) plus a one-way event channel from the host
//! to a specific UI process, and lifecycle notifications for UI-process
//! destruction. The registry and sync layer are written against the
//! [`Transport`] trait; [`LoopbackTransport`] is the in-process reference
//! implementation used by tests and the single-process host mode.

mod loopback;

pub use loopback::LoopbackTransport;

use crate::dispose::Disposer;
use crate::error::{CallError, TransportError};
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque identifier of a living UI process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UiProcessHandle(pub u32);

impl fmt::Display for UiProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ui#{}", self.0)
    }
}

/// One event delivered to a subscribed UI process, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEvent {
    pub module_id: String,
    pub event: String,
    pub args: Vec<Value>,
}

/// The single response of an in-flight call.
pub type CallFuture = BoxFuture<'static, Result<Value, CallError>>;

/// Handler for an inbound call channel. Receives the calling UI process's
/// handle and the call arguments.
pub type ChannelHandler = Arc<dyn Fn(UiProcessHandle, Vec<Value>) -> CallFuture + Send + Sync>;

/// Hook invoked when a UI process reports destruction.
pub type UiDestroyedHook = Arc<dyn Fn(UiProcessHandle) + Send + Sync>;

/// The raw request/response and event primitive under the messaging calls.
pub trait Transport: Send + Sync + 'static {
    /// Registers a handler for a call channel; last registration wins. The
    /// returned disposer removes the handler.
    fn on_call(&self, channel: &str, handler: ChannelHandler) -> Disposer;

    /// Emits one event on the given UI process's channel.
    fn send_event(&self, target: UiProcessHandle, event: ModuleEvent) -> Result<(), TransportError>;

    /// Whether the handle still resolves to a living UI process.
    fn is_live(&self, target: UiProcessHandle) -> bool;

    /// Registers a hook for UI-process destruction notifications.
    fn on_ui_destroyed(&self, hook: UiDestroyedHook) -> Disposer;
}
