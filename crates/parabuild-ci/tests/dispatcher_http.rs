//! HttpDispatcher against a local CI server stand-in.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, Router};
use parabuild_ci::{Dispatch, DispatcherConfig, HttpDispatcher};
use parabuild_domain::outcome::{MSG_BAD_PARAMETERS, MSG_FORBIDDEN, MSG_NOT_FOUND, MSG_TRIGGERED};
use parabuild_domain::{BuildVariables, Credential, CredentialSource, Job, Server, Trigger};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Clone)]
struct Hit {
    method: String,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    crumb: Option<String>,
}

type Hits = Arc<Mutex<Vec<Hit>>>;

async fn ci_server(State(hits): State<Hits>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    hits.lock().unwrap().push(Hit {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: header("authorization"),
        crumb: header("jenkins-crumb"),
    });

    let path = uri.path();
    match (method.as_str(), path) {
        ("GET", "/crumbIssuer/api/json") => {
            Json(json!({ "crumb": "abc123", "crumbRequestField": "Jenkins-Crumb" })).into_response()
        }
        ("GET", "/api/json") => Json(json!({ "mode": "NORMAL" })).into_response(),
        ("POST", "/job/crumbed/build") if header("jenkins-crumb").as_deref() == Some("abc123") => {
            StatusCode::CREATED.into_response()
        }
        ("POST", "/job/crumbed/build") => StatusCode::FORBIDDEN.into_response(),
        ("POST", "/job/moved/build") => Redirect::temporary("/job/ok/build").into_response(),
        ("POST", "/job/hop1/build") => {
            tokio::time::sleep(Duration::from_millis(700)).await;
            Redirect::temporary("/job/hop2/build").into_response()
        }
        ("POST", "/job/hop2/build") => {
            tokio::time::sleep(Duration::from_millis(700)).await;
            Redirect::temporary("/job/ok/build").into_response()
        }
        ("POST", "/job/slow/build") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::CREATED.into_response()
        }
        ("POST", p) if p.starts_with("/job/ok/") || p.starts_with("/job/team/job/app/") => {
            StatusCode::CREATED.into_response()
        }
        ("POST", p) if p.starts_with("/job/forbidden/") => StatusCode::FORBIDDEN.into_response(),
        ("POST", p) if p.starts_with("/job/broken/") => {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        ("POST", p) if p.starts_with("/job/gateway/") => StatusCode::BAD_GATEWAY.into_response(),
        ("POST", p) if p.starts_with("/job/teapot/") => StatusCode::IM_A_TEAPOT.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_ci_server() -> (String, Hits) {
    let hits: Hits = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(ci_server).with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base_url, hits)
}

/// Answers every request with `status_line` and an empty body.
async fn spawn_raw_server(status_line: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response =
                    format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    base_url
}

fn dispatcher() -> HttpDispatcher {
    HttpDispatcher::new(DispatcherConfig::default()).unwrap()
}

fn alice() -> Credential {
    Credential::new("alice", "s3cret", CredentialSource::UserProject)
}

fn vars() -> BuildVariables {
    BuildVariables {
        branch: "feature/login page".to_string(),
        commit: "c0ffee".to_string(),
        ..Default::default()
    }
}

fn job(name: &str) -> Job {
    Job::new(name, &[Trigger::Push])
}

#[tokio::test]
async fn test_created_is_triggered_with_basic_auth() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");

    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert_eq!(outcome.message, MSG_TRIGGERED);
    assert!(!outcome.error);
    assert!(!outcome.prompt);

    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].method, "POST");
    assert_eq!(hits[0].path, "/job/ok/build");
    assert_eq!(hits[0].authorization.as_deref(), Some("Basic YWxpY2U6czNjcmV0"));
}

#[tokio::test]
async fn test_parameters_and_folders() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(format!("{base}/"), "ci");
    let job = job("team/app").with_parameters("branch=$BRANCH\nsha=$COMMIT\nenv=staging;prod");

    let outcome = dispatcher().dispatch(&job, &server, &alice(), &vars()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let hits = hits.lock().unwrap();
    assert_eq!(hits[0].path, "/job/team/job/app/buildWithParameters");
    assert_eq!(
        hits[0].query.as_deref(),
        Some("branch=feature%2Flogin%20page&sha=c0ffee&env=staging")
    );
}

#[tokio::test]
async fn test_documented_error_statuses() {
    let (base, _hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");
    let d = dispatcher();

    for (name, message) in [
        ("forbidden", MSG_FORBIDDEN),
        ("missing", MSG_NOT_FOUND),
        ("broken", MSG_BAD_PARAMETERS),
        ("gateway", "Bad Gateway"),
        ("teapot", "I'm a teapot"),
    ] {
        let outcome = d.dispatch(&job(name), &server, &alice(), &vars()).await;
        assert!(outcome.error, "{name}");
        assert_eq!(outcome.message, message, "{name}");
    }
}

#[tokio::test]
async fn test_fallback_credential_sets_prompt() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");

    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &Credential::anonymous(), &vars())
        .await;
    assert!(outcome.is_success());
    assert!(outcome.prompt);
    assert!(hits.lock().unwrap()[0].authorization.is_none());

    let default = Credential::new("bot", "tok", CredentialSource::ServerDefault);
    let outcome = dispatcher().dispatch(&job("ok"), &server, &default, &vars()).await;
    assert!(outcome.prompt);
    assert_eq!(
        hits.lock().unwrap()[1].authorization.as_deref(),
        Some("Basic Ym90OnRvaw==")
    );
}

#[tokio::test]
async fn test_alt_url_sends_token_parameter() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci").with_alt_url(true);

    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert!(outcome.is_success());

    let hits = hits.lock().unwrap();
    assert_eq!(hits[0].query.as_deref(), Some("token=s3cret"));
    assert!(hits[0].authorization.is_none());
}

#[tokio::test]
async fn test_csrf_crumb_is_sent() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci").with_csrf(true);

    let outcome = dispatcher()
        .dispatch(&job("crumbed"), &server, &alice(), &vars())
        .await;
    assert!(outcome.is_success(), "{outcome:?}");

    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].path, "/crumbIssuer/api/json");
    assert_eq!(hits[0].authorization.as_deref(), Some("Basic YWxpY2U6czNjcmV0"));
    assert_eq!(hits[1].crumb.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_missing_crumb_still_posts() {
    let (base, hits) = spawn_ci_server().await;
    // Crumb issuer lives elsewhere; the GET 404s.
    let server = Server::new(format!("{base}/nested"), "ci").with_csrf(true);

    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert_eq!(outcome.message, MSG_NOT_FOUND);

    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].method, "POST");
    assert!(hits[1].crumb.is_none());
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");

    let outcome = dispatcher()
        .dispatch(&job("moved"), &server, &alice(), &vars())
        .await;
    assert!(outcome.is_success(), "{outcome:?}");

    let hits = hits.lock().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].path, "/job/ok/build");
    assert_eq!(hits[1].method, "POST");
}

#[tokio::test]
async fn test_server_reason_phrase_is_reported() {
    let server = Server::new(spawn_raw_server("HTTP/1.1 502 Jenkins Is Restarting").await, "ci");
    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert!(outcome.error);
    assert_eq!(outcome.message, "Jenkins Is Restarting");

    let server = Server::new(spawn_raw_server("HTTP/1.1 599 Queue Full").await, "ci");
    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert_eq!(outcome.message, "Queue Full");

    let check = dispatcher().test_connection(&server, &alice()).await;
    assert!(check.error);
    assert_eq!(check.message, "Failed to establish connection: Queue Full");
}

#[tokio::test]
async fn test_unknown_status_without_phrase_reports_code() {
    let server = Server::new(spawn_raw_server("HTTP/1.1 599 ").await, "ci");
    let outcome = dispatcher()
        .dispatch(&job("ok"), &server, &alice(), &vars())
        .await;
    assert!(outcome.error);
    assert_eq!(outcome.message, "HTTP 599");
}

#[tokio::test]
async fn test_read_timeout_applies_per_hop() {
    let (base, hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");
    let d = HttpDispatcher::new(
        DispatcherConfig::default().with_read_timeout(Duration::from_secs(1)),
    )
    .unwrap();

    let outcome = d.dispatch(&job("hop1"), &server, &alice(), &vars()).await;
    assert!(outcome.is_success(), "{outcome:?}");

    let paths: Vec<String> = hits.lock().unwrap().iter().map(|h| h.path.clone()).collect();
    assert_eq!(paths, vec!["/job/hop1/build", "/job/hop2/build", "/job/ok/build"]);
}

#[tokio::test]
async fn test_total_timeout_caps_redirect_chain() {
    let (base, _hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");
    let d = HttpDispatcher::new(
        DispatcherConfig::default()
            .with_read_timeout(Duration::from_secs(1))
            .with_total_timeout(Duration::from_secs(1)),
    )
    .unwrap();

    let outcome = d.dispatch(&job("hop1"), &server, &alice(), &vars()).await;
    assert!(outcome.error);
    assert!(
        outcome.message.starts_with("IO exception occurred"),
        "{}",
        outcome.message
    );
}

#[tokio::test]
async fn test_read_timeout_is_io_error() {
    let (base, _hits) = spawn_ci_server().await;
    let server = Server::new(&base, "ci");
    let d = HttpDispatcher::new(
        DispatcherConfig::default().with_read_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let outcome = d.dispatch(&job("slow"), &server, &alice(), &vars()).await;
    assert!(outcome.error);
    assert!(
        outcome.message.starts_with("IO exception occurred"),
        "{}",
        outcome.message
    );
}

#[tokio::test]
async fn test_connection_check() {
    let (base, hits) = spawn_ci_server().await;

    let ok = dispatcher()
        .test_connection(&Server::new(&base, "ci"), &alice())
        .await;
    assert!(ok.is_success());
    assert_eq!(ok.message, "Connection successful");
    assert_eq!(hits.lock().unwrap()[0].path, "/api/json");

    let refused = dispatcher()
        .test_connection(&Server::new("http://127.0.0.1:1", "ci"), &alice())
        .await;
    assert!(refused.error);
    assert!(refused.message.starts_with("Failed to establish connection"));
}
