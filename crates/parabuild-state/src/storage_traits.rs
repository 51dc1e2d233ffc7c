//! Storage trait definitions for parabuild
//!
//! The configuration store is a key-value map owned by the host. The core
//! only ever reads it:
//! - `SettingsKey`: scope-namespaced keys for servers and user tokens
//! - `SettingsStore`: async, backend-agnostic read access
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

const SERVER_SETTINGS: &str = ".jenkinsSettings";
const USER_TOKEN: &str = ".jenkinsUser.";

// ---------------------------------------------------------------------------
// SettingsKey
// ---------------------------------------------------------------------------

/// A scope-namespaced configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    /// The single global server.
    GlobalServer,
    /// The server for one project.
    ProjectServer(String),
    /// A user's personal token, global when `project` is `None`.
    UserToken {
        slug: String,
        project: Option<String>,
    },
}

impl SettingsKey {
    pub fn project_server(project_key: impl Into<String>) -> Self {
        SettingsKey::ProjectServer(project_key.into())
    }

    pub fn global_token(slug: impl Into<String>) -> Self {
        SettingsKey::UserToken {
            slug: slug.into(),
            project: None,
        }
    }

    pub fn project_token(slug: impl Into<String>, project_key: impl Into<String>) -> Self {
        SettingsKey::UserToken {
            slug: slug.into(),
            project: Some(project_key.into()),
        }
    }

    /// The raw key in the host's settings map.
    pub fn as_key(&self) -> String {
        match self {
            SettingsKey::GlobalServer => SERVER_SETTINGS.to_string(),
            SettingsKey::ProjectServer(project) => format!("{SERVER_SETTINGS}.{project}"),
            SettingsKey::UserToken {
                slug,
                project: None,
            } => format!("{USER_TOKEN}{slug}"),
            SettingsKey::UserToken {
                slug,
                project: Some(project),
            } => format!("{USER_TOKEN}{slug}.{project}"),
        }
    }
}

impl std::fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Read access to the host's configuration store.
///
/// Guarantees:
/// - `get` never mutates the store.
/// - An absent key is `Ok(None)`, not an error.
/// - Values are returned as stored: a server may be an object or a legacy string.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    async fn get(&self, key: &SettingsKey) -> StorageResult<Option<Value>>;

    /// Fetch a value as text, treating empty strings as absent.
    async fn get_text(&self, key: &SettingsKey) -> StorageResult<Option<String>> {
        let text = match self.get(key).await? {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => return Ok(None),
            Some(other) => other.to_string(),
        };
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}
