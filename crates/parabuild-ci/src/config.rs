//! HTTP dispatch configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read timeout for a trigger request.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Upper bound on each wait for data from the CI server
    pub read_timeout: Duration,
    /// Optional cap on a whole request, redirects included
    #[serde(default)]
    pub total_timeout: Option<Duration>,
    /// Upper bound on establishing the connection
    pub connect_timeout: Duration,
    /// Redirects followed before giving up
    pub max_redirects: usize,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            total_timeout: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: format!("parabuild/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DispatcherConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Reads `PARABUILD_READ_TIMEOUT_SECS`, `PARABUILD_TOTAL_TIMEOUT_SECS`,
    /// `PARABUILD_CONNECT_TIMEOUT_SECS` and `PARABUILD_MAX_REDIRECTS`;
    /// unparsable values are ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        DispatcherConfig {
            read_timeout: env_parse("PARABUILD_READ_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_timeout),
            total_timeout: env_parse("PARABUILD_TOTAL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .or(defaults.total_timeout),
            connect_timeout: env_parse("PARABUILD_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            max_redirects: env_parse("PARABUILD_MAX_REDIRECTS")
                .unwrap_or(defaults.max_redirects),
            user_agent: defaults.user_agent,
        }
    }

    /// Override the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Cap the whole request, redirects included
    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
