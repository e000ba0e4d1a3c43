//! Storage Service Module
//!
//! Owns the persisted setting store for the whole host. Other modules fetch
//! this module through the registry during their setup and obtain a
//! module-scoped [`modhub::SettingService`]; UI processes reach the raw
//! key/value surface through the `get-item`/`set-item`/`remove-item`
//! calls.

pub mod module;
pub use module::StorageModule;
