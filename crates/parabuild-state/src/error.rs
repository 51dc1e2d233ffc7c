//! Error types for parabuild-state

use thiserror::Error;

/// Errors that can occur while reading configuration settings
#[derive(Error, Debug)]
pub enum StorageError {
    /// Settings file could not be read
    #[error("Failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings content is not valid JSON
    #[error("Settings deserialization failed: {0}")]
    Deserialization(String),

    /// Settings document has the wrong shape
    #[error("Malformed settings: {0}")]
    Malformed(String),

    /// Backend-specific failure
    #[error("Settings backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}
