//! JSON file snapshot of the host's settings map.
//!
//! The file is a single JSON object keyed by raw settings keys, e.g.
//!
//! ```json
//! {
//!   ".jenkinsSettings": "http://ci;admin;token",
//!   ".jenkinsSettings.PROJ": { "baseUrl": "http://proj-ci", "alias": "proj" },
//!   ".jenkinsUser.alice.PROJ": "alice-token"
//! }
//! ```
//!
//! It is read once at load time; later edits to the file are not observed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

/// Immutable settings snapshot loaded from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    values: HashMap<String, Value>,
}

impl JsonFileSettingsStore {
    /// Read and parse the settings file.
    pub async fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let store = Self::from_json(&raw)?;
        debug!(path = %path.display(), keys = store.values.len(), "Loaded settings snapshot");
        Ok(Self { path, ..store })
    }

    /// Parse a settings snapshot from a JSON document.
    pub fn from_json(raw: &str) -> StorageResult<Self> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(Self {
                path: PathBuf::new(),
                values: map.into_iter().collect(),
            }),
            _ => Err(StorageError::Malformed(
                "settings document must be a JSON object".to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn get(&self, key: &SettingsKey) -> StorageResult<Option<Value>> {
        Ok(self.values.get(&key.as_key()).cloned())
    }
}
