//! Remote build dispatch.
//!
//! [`HttpDispatcher`] turns a selected job, a resolved server and credential
//! and the event's build variables into one POST against the CI server, and
//! classifies whatever happens into a [`TriggerOutcome`]. Transport faults
//! never escape as errors.

use async_trait::async_trait;
use parabuild_domain::{render_query, BuildVariables, Credential, Job, Server, TriggerOutcome};
use reqwest::header::HeaderName;
use reqwest::{RequestBuilder, Url};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::DispatcherConfig;

pub const MSG_CONNECTED: &str = "Connection successful";

/// Starts a remote build for a job.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Trigger `job` on `server` as `credential`. Always returns an outcome.
    async fn dispatch(
        &self,
        job: &Job,
        server: &Server,
        credential: &Credential,
        vars: &BuildVariables,
    ) -> TriggerOutcome;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Crumb {
    crumb: String,
    crumb_request_field: String,
}

/// reqwest-backed dispatcher.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    config: DispatcherConfig,
}

impl HttpDispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self, reqwest::Error> {
        let builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .read_timeout(config.read_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        let builder = match config.total_timeout {
            Some(total) => builder.timeout(total),
            None => builder,
        };
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Check that the server answers with the given credential.
    pub async fn test_connection(&self, server: &Server, credential: &Credential) -> TriggerOutcome {
        let prompt = credential.prompt();
        let url = format!("{}/api/json", server.trimmed_base_url());
        let url = match Url::parse(&url) {
            Ok(url) => url,
            Err(e) => return TriggerOutcome::failed(format!("Malformed URL: {e}"), prompt),
        };

        match authorize(self.client.get(url), server, credential).send().await {
            Ok(response) if response.status().is_success() => TriggerOutcome {
                error: false,
                message: MSG_CONNECTED.to_string(),
                prompt,
            },
            Ok(response) => {
                let reason = match reason_phrase(&response) {
                    reason if reason.is_empty() => response.status().as_str().to_string(),
                    reason => reason,
                };
                TriggerOutcome::failed(format!("Failed to establish connection: {reason}"), prompt)
            }
            Err(e) => TriggerOutcome::failed(
                format!("Failed to establish connection: {}", e.without_url()),
                prompt,
            ),
        }
    }

    async fn fetch_crumb(&self, server: &Server, credential: &Credential) -> Option<Crumb> {
        let url = format!("{}/crumbIssuer/api/json", server.trimmed_base_url());
        let response = match authorize(self.client.get(&url), server, credential).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(server = %server.base_url, error = %e.without_url(), "Crumb request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(server = %server.base_url, status = response.status().as_u16(), "Crumb issuer refused");
            return None;
        }
        match response.json::<Crumb>().await {
            Ok(crumb) => Some(crumb),
            Err(e) => {
                warn!(server = %server.base_url, error = %e.without_url(), "Unreadable crumb response");
                None
            }
        }
    }
}

#[async_trait]
impl Dispatch for HttpDispatcher {
    async fn dispatch(
        &self,
        job: &Job,
        server: &Server,
        credential: &Credential,
        vars: &BuildVariables,
    ) -> TriggerOutcome {
        let prompt = credential.prompt();
        let url = match Url::parse(&build_url(job, server, credential, vars)) {
            Ok(url) => url,
            Err(e) => return TriggerOutcome::failed(format!("Malformed URL: {e}"), prompt),
        };

        let mut request = authorize(self.client.post(url), server, credential);
        if server.csrf_enabled {
            if let Some(crumb) = self.fetch_crumb(server, credential).await {
                match HeaderName::from_bytes(crumb.crumb_request_field.as_bytes()) {
                    Ok(name) => request = request.header(name, crumb.crumb),
                    Err(_) => warn!(
                        field = %crumb.crumb_request_field,
                        "Ignoring crumb with invalid header name"
                    ),
                }
            }
        }

        let outcome = match request.send().await {
            Ok(response) => {
                let reason = reason_phrase(&response);
                TriggerOutcome::from_status(response.status().as_u16(), &reason, prompt)
            }
            Err(e) => transport_failure(e.without_url(), prompt),
        };

        if outcome.error {
            warn!(job = %job.job_name, server = %server.base_url, message = %outcome.message, "Build trigger failed");
        } else {
            info!(job = %job.job_name, server = %server.base_url, "Build triggered");
        }
        outcome
    }
}

/// Full trigger URL for `job`.
///
/// `{base}/job/{name}/build` without parameters, `buildWithParameters`
/// with them. In alt-url mode the secret travels as `token=`.
pub fn build_url(
    job: &Job,
    server: &Server,
    credential: &Credential,
    vars: &BuildVariables,
) -> String {
    let query = render_query(&job.build_parameters, vars);
    let endpoint = if query.is_empty() {
        "build"
    } else {
        "buildWithParameters"
    };

    let mut params = Vec::with_capacity(2);
    if uses_token_param(server, credential) {
        params.push(format!("token={}", urlencoding::encode(&credential.secret)));
    }
    if !query.is_empty() {
        params.push(query);
    }

    let mut url = format!("{}/{}/{}", server.trimmed_base_url(), job.job_path(), endpoint);
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url.replace(' ', "%20")
}

/// Reason phrase as sent on the status line, else the canonical one for the
/// code, else empty.
fn reason_phrase(response: &reqwest::Response) -> String {
    response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| response.status().canonical_reason().map(str::to_string))
        .unwrap_or_default()
}

fn uses_token_param(server: &Server, credential: &Credential) -> bool {
    server.alt_url && credential.has_secret()
}

fn authorize(request: RequestBuilder, server: &Server, credential: &Credential) -> RequestBuilder {
    if uses_token_param(server, credential) {
        return request;
    }
    match credential.basic_auth() {
        Some((username, secret)) => request.basic_auth(username, Some(secret)),
        None => request,
    }
}

fn transport_failure(err: reqwest::Error, prompt: bool) -> TriggerOutcome {
    let message = if err.is_builder() {
        format!("Malformed URL: {err}")
    } else if err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || err.is_body()
        || err.is_redirect()
    {
        format!("IO exception occurred: {err}")
    } else {
        format!("Something went wrong: {err}")
    };
    TriggerOutcome::failed(message, prompt)
}
