//! Parabuild Domain Model
//!
//! Immutable configuration values shared by every parabuild component:
//! - Job / Trigger: which repository activity starts which remote build
//! - Server / Credential: where builds are triggered and as whom
//! - RepositoryEvent: the normalized ref change or pull-request notification
//! - BuildVariables: event metadata rendered into build parameters
//! - TriggerOutcome: the classified result of one dispatch attempt
//!
//! Values are loaded once per event and never mutated by the core.

pub mod error;
pub mod event;
pub mod job;
pub mod outcome;
pub mod params;
pub mod server;

pub use error::{DomainError, Result};
pub use event::{ChangeKind, PullRequest, RepositoryEvent, User};
pub use job::{jobs_from_hook_settings, Job, Trigger};
pub use outcome::TriggerOutcome;
pub use params::{render_query, BuildVariables};
pub use server::{Credential, CredentialSource, Server};

/// Parabuild domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
