//! Module registry and reactive cross-process state synchronization.
//!
//! A DeskPilot host is a single privileged process composed of independent
//! modules. Each module registers callable methods, broadcasts live state to
//! the UI processes that subscribed to it, and can mirror mutable reactive
//! fields over the transport with minimal, correctly-ordered update events.
//! Specific fields may additionally be backed by persisted configuration,
//! loaded before the reactive mirror starts pushing.
//!
//! The pieces, bottom up:
//!
//! - [`transport`]: the bidirectional call/event channel to UI processes,
//!   abstracted behind [`Transport`].
//! - [`reactive`]: the in-process observation primitive ([`Prop`],
//!   [`ReactiveState`]) the sync helpers are generic over.
//! - [`module`]: the unit the registry manages, with its identity,
//!   lifecycle and private method table.
//! - [`registry`]: the process-wide module directory, call dispatch and
//!   event fan-out.
//! - [`sync`]: getter sync, dot-prop sync and persisted-setting sync built
//!   on [`ModuleRuntime`].

pub mod channel;
pub mod dispose;
pub mod error;
pub mod module;
pub mod reactive;
pub mod registry;
pub mod settings;
pub mod sync;
pub mod transport;

pub use channel::ChannelId;
pub use dispose::Disposer;
pub use error::{CallError, RegistryError, SettingsError, SyncError, TransportError};
pub use module::{arg, MethodHandler, Module, ModuleRuntime};
pub use reactive::{Observable, Prop, ReactiveState, WatchEffect};
pub use registry::ModuleRegistry;
pub use settings::{MemorySettingsBackend, SettingService, SettingsBackend};
pub use sync::{setting_override, SettingOutcome, SettingOverride};
pub use transport::{LoopbackTransport, ModuleEvent, Transport, UiProcessHandle};
