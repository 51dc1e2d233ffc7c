//! Error types for configuration model operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed server setting: {0}")]
    MalformedServer(String),

    #[error("Unsupported setting type for {key}: expected {expected}")]
    UnexpectedSettingType { key: String, expected: &'static str },
}

/// Result type for configuration model operations
pub type Result<T> = std::result::Result<T, DomainError>;
