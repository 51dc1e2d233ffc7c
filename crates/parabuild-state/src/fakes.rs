//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemorySettingsStore`, which satisfies the `SettingsStore`
//! contract without any external dependencies and lets tests seed values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemorySettingsStore
// ---------------------------------------------------------------------------

/// In-memory settings store backed by a `HashMap<key, value>`.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
    reads: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, as the settings CRUD layer would.
    pub fn put(&self, key: &SettingsKey, value: impl Into<Value>) {
        let mut values = self.values.lock().unwrap();
        values.insert(key.as_key(), value.into());
    }

    pub fn remove(&self, key: &SettingsKey) {
        let mut values = self.values.lock().unwrap();
        values.remove(&key.as_key());
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &SettingsKey) -> StorageResult<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let values = self.values.lock().unwrap();
        Ok(values.get(&key.as_key()).cloned())
    }
}
