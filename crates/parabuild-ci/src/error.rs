//! Error types for resolution and change enumeration

use parabuild_domain::DomainError;
use parabuild_state::StorageError;
use thiserror::Error;

/// Why a server and credential could not be resolved.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Neither a project nor a global server exists.
    #[error("No CI server configured for project {project_key} or globally")]
    NotConfigured { project_key: String },

    #[error("Settings store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid server setting: {0}")]
    InvalidServer(#[from] DomainError),
}

/// Failure while enumerating changed paths.
#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("Failed to start change listing: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to read change listing: {0}")]
    Read(#[source] std::io::Error),

    #[error("Change listing failed: {0}")]
    Backend(String),
}
