//! CI server definitions and resolved credentials.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, Result};

/// A CI endpoint definition.
///
/// Stored either as a structured record or, for installations that predate
/// it, as the string `url;user;token[;altUrl]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub base_url: String,

    /// Human-readable name shown in the settings UI.
    #[serde(default)]
    pub alias: String,

    /// Default username used when the acting user has no personal token.
    #[serde(default, alias = "defaultUser")]
    pub user: String,

    /// Default token paired with `user`.
    #[serde(default)]
    pub token: String,

    /// Deliver the token as a query parameter instead of Basic-Auth.
    #[serde(default, alias = "rootTokenEnabled")]
    pub alt_url: bool,

    /// Fetch a CSRF crumb before triggering.
    #[serde(default)]
    pub csrf_enabled: bool,
}

impl Server {
    pub fn new(base_url: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            alias: alias.into(),
            user: String::new(),
            token: String::new(),
            alt_url: false,
            csrf_enabled: false,
        }
    }

    pub fn with_default_credentials(
        mut self,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.token = token.into();
        self
    }

    pub fn with_alt_url(mut self, alt_url: bool) -> Self {
        self.alt_url = alt_url;
        self
    }

    pub fn with_csrf(mut self, csrf_enabled: bool) -> Self {
        self.csrf_enabled = csrf_enabled;
        self
    }

    /// Decode a stored server setting in either representation.
    pub fn from_setting(value: &Value) -> Result<Self> {
        match value {
            Value::Object(_) => {
                let server: Server = serde_json::from_value(value.clone())?;
                if server.base_url.trim().is_empty() {
                    return Err(DomainError::MalformedServer("empty base url".to_string()));
                }
                Ok(server)
            }
            Value::String(legacy) => Self::parse_legacy(legacy),
            _ => Err(DomainError::UnexpectedSettingType {
                key: "server".to_string(),
                expected: "object or legacy string",
            }),
        }
    }

    /// Parse the legacy `url;user;token[;altUrl]` form.
    ///
    /// Only the literal `true` enables alt-url mode.
    pub fn parse_legacy(raw: &str) -> Result<Self> {
        let mut fields = raw.split(';');
        let base_url = fields.next().unwrap_or_default().trim().to_string();
        if base_url.is_empty() {
            return Err(DomainError::MalformedServer(raw.to_string()));
        }
        let user = fields.next().unwrap_or_default().to_string();
        let token = fields.next().unwrap_or_default().to_string();
        let alt_url = fields.next() == Some("true");

        Ok(Self {
            base_url,
            alias: String::new(),
            user,
            token,
            alt_url,
            csrf_enabled: false,
        })
    }

    pub fn has_default_user(&self) -> bool {
        !self.user.is_empty()
    }

    /// Base url without trailing slashes.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Input problems the settings layer should reject before saving.
    pub fn sanitize(&self) -> Vec<String> {
        let mut errors = Vec::with_capacity(2);
        if self.base_url.trim().is_empty() {
            errors.push("Base Url required.".to_string());
        }
        if self.alias.trim().is_empty() {
            errors.push("Alias required.".to_string());
        }
        errors
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// The acting user's token for this project.
    UserProject,
    /// The acting user's global token.
    UserGlobal,
    /// The server's default user and token.
    ServerDefault,
    /// Nothing configured; dispatch without credentials.
    Anonymous,
}

/// A resolved `(username, secret)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub secret: String,
    pub source: CredentialSource,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        source: CredentialSource,
    ) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            source,
        }
    }

    pub fn anonymous() -> Self {
        Self::new("", "", CredentialSource::Anonymous)
    }

    /// Whether the acting user should be told to configure a personal token.
    pub fn prompt(&self) -> bool {
        matches!(
            self.source,
            CredentialSource::ServerDefault | CredentialSource::Anonymous
        )
    }

    /// `(username, secret)` for a Basic-Auth header, if there is a username.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.secret.as_str()))
        }
    }

    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &if self.secret.is_empty() { "" } else { "***" })
            .field("source", &self.source)
            .finish()
    }
}
