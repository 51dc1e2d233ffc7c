//! Parabuild-State: read-only configuration store access
//!
//! This crate provides the persistence seam for parabuild. The host owns the
//! settings map and its CRUD layer; parabuild reads servers and personal
//! tokens from it through the [`SettingsStore`] trait.
//!
//! ## Key Components
//!
//! - `SettingsKey`: scope-namespaced keys (global, per-project, per-user)
//! - `SettingsStore`: async read access to raw setting values
//! - `JsonFileSettingsStore`: immutable snapshot loaded from a JSON file
//! - `fakes::MemorySettingsStore`: seeded in-memory store for tests

mod error;
pub mod fakes;
mod file_store;
pub mod storage_traits;

pub use error::StorageError;
pub use file_store::JsonFileSettingsStore;
pub use storage_traits::{SettingsKey, SettingsStore, StorageResult};
