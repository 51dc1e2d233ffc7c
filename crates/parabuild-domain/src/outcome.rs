//! Result of a single dispatch attempt.

use serde::{Deserialize, Serialize};

pub const MSG_TRIGGERED: &str = "Build triggered";
pub const MSG_FORBIDDEN: &str = "Insufficient permissions to build this job";
pub const MSG_NOT_FOUND: &str = "Job not found";
pub const MSG_BAD_PARAMETERS: &str = "Invalid build parameters";
pub const MSG_NOT_CONFIGURED: &str = "CI server settings are not set up";

/// Outcome of triggering one job for one event. Never aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub error: bool,
    pub message: String,
    /// The dispatch used a fallback credential; the user should configure a token.
    pub prompt: bool,
}

impl TriggerOutcome {
    pub fn triggered(prompt: bool) -> Self {
        Self {
            error: false,
            message: MSG_TRIGGERED.to_string(),
            prompt,
        }
    }

    pub fn failed(message: impl Into<String>, prompt: bool) -> Self {
        Self {
            error: true,
            message: message.into(),
            prompt,
        }
    }

    pub fn not_configured() -> Self {
        Self::failed(MSG_NOT_CONFIGURED, false)
    }

    /// Classify an HTTP response status.
    ///
    /// Only 201 counts as success; unknown statuses carry `reason`.
    pub fn from_status(status: u16, reason: &str, prompt: bool) -> Self {
        match status {
            201 => Self::triggered(prompt),
            403 => Self::failed(MSG_FORBIDDEN, prompt),
            404 => Self::failed(MSG_NOT_FOUND, prompt),
            500 => Self::failed(MSG_BAD_PARAMETERS, prompt),
            _ if reason.is_empty() => Self::failed(format!("HTTP {status}"), prompt),
            _ => Self::failed(reason, prompt),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_statuses() {
        assert_eq!(TriggerOutcome::from_status(201, "Created", true), TriggerOutcome::triggered(true));
        assert_eq!(TriggerOutcome::from_status(403, "Forbidden", false).message, MSG_FORBIDDEN);
        assert_eq!(TriggerOutcome::from_status(404, "Not Found", false).message, MSG_NOT_FOUND);
        assert_eq!(
            TriggerOutcome::from_status(500, "Internal Server Error", false).message,
            MSG_BAD_PARAMETERS
        );
        for status in [403, 404, 500] {
            assert!(TriggerOutcome::from_status(status, "", false).error);
        }
    }

    #[test]
    fn test_other_statuses_are_errors_with_reason() {
        let outcome = TriggerOutcome::from_status(502, "Bad Gateway", true);
        assert!(outcome.error);
        assert!(outcome.prompt);
        assert_eq!(outcome.message, "Bad Gateway");

        for status in [200, 202, 204, 301, 400, 401, 503] {
            assert!(TriggerOutcome::from_status(status, "x", false).error);
        }
    }

    #[test]
    fn test_missing_reason_falls_back_to_code() {
        assert_eq!(TriggerOutcome::from_status(599, "", false).message, "HTTP 599");
    }
}
