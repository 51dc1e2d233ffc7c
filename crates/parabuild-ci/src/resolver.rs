//! Server and credential resolution.
//!
//! Precedence, highest first:
//! - server: project-scoped, then global
//! - credential: the user's project token, the user's global token, the
//!   server's default user and token, then anonymous

use std::sync::Arc;

use parabuild_domain::{Credential, CredentialSource, Server, User};
use parabuild_state::{SettingsKey, SettingsStore};
use tracing::debug;

use crate::error::ResolveError;

/// The server to trigger on and the credential to present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub server: Server,
    pub credential: Credential,
}

/// Resolves servers and credentials from a read-only settings store.
pub struct CredentialResolver {
    store: Arc<dyn SettingsStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Resolve the server and credential for `project_key` acting as `user`.
    pub async fn resolve(
        &self,
        project_key: &str,
        user: Option<&User>,
    ) -> Result<Resolved, ResolveError> {
        let server = self
            .server(project_key)
            .await?
            .ok_or_else(|| ResolveError::NotConfigured {
                project_key: project_key.to_string(),
            })?;

        let credential = match self.personal_token(project_key, user).await? {
            Some(credential) => credential,
            None if server.has_default_user() => Credential::new(
                server.user.clone(),
                server.token.clone(),
                CredentialSource::ServerDefault,
            ),
            None => Credential::anonymous(),
        };

        debug!(
            project = project_key,
            server = %server.base_url,
            source = ?credential.source,
            "Resolved CI credential"
        );
        Ok(Resolved { server, credential })
    }

    /// The server that applies to `project_key`, if any.
    pub async fn server(&self, project_key: &str) -> Result<Option<Server>, ResolveError> {
        for key in [
            SettingsKey::project_server(project_key),
            SettingsKey::GlobalServer,
        ] {
            if let Some(value) = self.store.get(&key).await? {
                return Ok(Some(Server::from_setting(&value)?));
            }
        }
        Ok(None)
    }

    async fn personal_token(
        &self,
        project_key: &str,
        user: Option<&User>,
    ) -> Result<Option<Credential>, ResolveError> {
        let Some(user) = user else {
            return Ok(None);
        };

        let scoped = [
            (
                SettingsKey::project_token(&user.slug, project_key),
                CredentialSource::UserProject,
            ),
            (
                SettingsKey::global_token(&user.slug),
                CredentialSource::UserGlobal,
            ),
        ];
        for (key, source) in scoped {
            if let Some(token) = self.store.get_text(&key).await? {
                return Ok(Some(Credential::new(user.slug.clone(), token, source)));
            }
        }
        Ok(None)
    }
}
