//! Parabuild CI - build triggers for source-control events
//!
//! Provides the event-time core that:
//! - Resolves the CI server and the credential to act as
//! - Decides which configured jobs an event fires, scanning changed paths lazily
//! - Dispatches each firing job as one HTTP request and classifies the result
//! - Validates job lists and server records before they are saved

pub mod changes;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod telemetry;
pub mod validate;

// Re-export key types
pub use changes::{ChangeSource, ChangeStream, GitChangeSource, StaticChangeSource};
pub use config::DispatcherConfig;
pub use dispatcher::{build_url, Dispatch, HttpDispatcher};
pub use engine::{FiredJob, JobDecision, MatchReason, TriggerEngine};
pub use error::{ChangeError, ResolveError};
pub use resolver::{CredentialResolver, Resolved};
pub use validate::{validate_jobs, validate_server, FieldError};
