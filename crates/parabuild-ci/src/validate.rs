//! Settings validation for job lists and server records.

use parabuild_domain::job::{BRANCH_PREFIX, JOB_PREFIX, PATH_PREFIX, PR_DEST_PREFIX, TRIGGER_PREFIX};
use parabuild_domain::{Job, Server};
use serde::Serialize;

use crate::engine::filter_regex;

/// Field key reported when no server is available to validate jobs against.
pub const ADMIN_ERROR_FIELD: &str = "jenkins-admin-error";

pub const MSG_ADMIN_REQUIRED: &str =
    "A CI server must be configured before jobs can be saved";
pub const MSG_FIELD_REQUIRED: &str = "Field is required";
pub const MSG_TRIGGER_REQUIRED: &str = "You must choose at least one trigger";

/// A validation error keyed by hook-settings field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a repository's job list.
///
/// Field names use the job's position, e.g. `jobName-0`.
pub fn validate_jobs(jobs: &[Job], server_configured: bool) -> Vec<FieldError> {
    if !server_configured {
        return vec![FieldError::new(ADMIN_ERROR_FIELD, MSG_ADMIN_REQUIRED)];
    }

    let mut errors = Vec::new();
    for (i, job) in jobs.iter().enumerate() {
        if job.job_name.trim().is_empty() {
            errors.push(FieldError::new(format!("{JOB_PREFIX}{i}"), MSG_FIELD_REQUIRED));
        }
        if job.is_misconfigured() {
            errors.push(FieldError::new(
                format!("{TRIGGER_PREFIX}{i}"),
                MSG_TRIGGER_REQUIRED,
            ));
        }
        // Compiled exactly as the engine compiles them at match time.
        for (prefix, pattern, case_insensitive) in [
            (BRANCH_PREFIX, &job.branch_regex, true),
            (PATH_PREFIX, &job.path_regex, false),
            (PR_DEST_PREFIX, &job.pr_dest_regex, true),
        ] {
            if let Err(e) = filter_regex(pattern, case_insensitive) {
                errors.push(FieldError::new(format!("{prefix}{i}"), e.to_string()));
            }
        }
    }
    errors
}

/// Problems with a server record, empty when it can be saved.
pub fn validate_server(server: &Server) -> Vec<String> {
    server.sanitize()
}
