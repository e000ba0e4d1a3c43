//! In-process reference transport.

use super::{ChannelHandler, ModuleEvent, Transport, UiDestroyedHook, UiProcessHandle};
use crate::dispose::Disposer;
use crate::error::{CallError, TransportError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An in-process transport: calls dispatch directly to registered handlers,
/// events land in an unbounded mailbox per attached UI handle.
///
/// UI processes are modeled explicitly: [`LoopbackTransport::attach_ui`]
/// brings a handle to life and returns its event mailbox,
/// [`LoopbackTransport::destroy_ui`] fires the destruction hooks. Cloning is
/// cheap and shares the same transport.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    shared: Arc<LoopbackShared>,
}

#[derive(Default)]
struct LoopbackShared {
    handlers: RwLock<HashMap<String, ChannelHandler>>,
    mailboxes: RwLock<HashMap<UiProcessHandle, mpsc::UnboundedSender<ModuleEvent>>>,
    hooks: RwLock<BTreeMap<u64, UiDestroyedHook>>,
    next_hook: AtomicU64,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a UI process and returns the receiving end of its event
    /// channel. Re-attaching an existing handle replaces its mailbox.
    pub fn attach_ui(&self, handle: UiProcessHandle) -> mpsc::UnboundedReceiver<ModuleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.mailboxes.write().insert(handle, tx);
        rx
    }

    /// Destroys a UI process: drops its mailbox and fires every destruction
    /// hook, mirroring the lifecycle notification a real transport delivers.
    pub fn destroy_ui(&self, handle: UiProcessHandle) {
        self.shared.mailboxes.write().remove(&handle);
        let hooks: Vec<UiDestroyedHook> = self.shared.hooks.read().values().cloned().collect();
        for hook in hooks {
            hook(handle);
        }
    }

    /// Drops a UI process's mailbox without firing destruction hooks,
    /// modeling a destruction notification that has not been delivered yet.
    pub fn drop_mailbox(&self, handle: UiProcessHandle) {
        self.shared.mailboxes.write().remove(&handle);
    }

    /// Performs one call as `caller`, returning the handler's single
    /// response.
    pub async fn call(
        &self,
        caller: UiProcessHandle,
        channel: &str,
        args: Vec<Value>,
    ) -> Result<Value, CallError> {
        let handler = self
            .shared
            .handlers
            .read()
            .get(channel)
            .cloned()
            .ok_or_else(|| CallError::UnknownChannel(channel.to_string()))?;
        handler(caller, args).await
    }
}

impl Transport for LoopbackTransport {
    fn on_call(&self, channel: &str, handler: ChannelHandler) -> Disposer {
        self.shared
            .handlers
            .write()
            .insert(channel.to_string(), handler);
        let shared = Arc::downgrade(&self.shared);
        let channel = channel.to_string();
        Disposer::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.handlers.write().remove(&channel);
            }
        })
    }

    fn send_event(&self, target: UiProcessHandle, event: ModuleEvent) -> Result<(), TransportError> {
        let mailboxes = self.shared.mailboxes.read();
        let tx = mailboxes
            .get(&target)
            .ok_or(TransportError::UnknownUiProcess(target))?;
        tx.send(event)
            .map_err(|_| TransportError::ChannelClosed(target))
    }

    fn is_live(&self, target: UiProcessHandle) -> bool {
        self.shared.mailboxes.read().contains_key(&target)
    }

    fn on_ui_destroyed(&self, hook: UiDestroyedHook) -> Disposer {
        let key = self.shared.next_hook.fetch_add(1, Ordering::Relaxed);
        self.shared.hooks.write().insert(key, hook);
        let shared = Arc::downgrade(&self.shared);
        Disposer::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.hooks.write().remove(&key);
            }
        })
    }
}
