#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, http::header};
use chrono::Utc;
use serde_json::json;

use task_gateway::app::{backends, build_router, build_state};
use task_gateway::config::Config;
use task_gateway::gateway::{ForwardRequest, Forwarder, ProxyError, RouteTable, default_rules};
use task_gateway::services::auth::{IdentityAssertion, Role, TokenCodec, build_identity_verifier};
use task_gateway::state::AppState;

pub const SECRET: &str = "integration-test-secret";

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn test_config(vars: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    map.insert("JWT_SECRET".into(), SECRET.into());
    map.insert("AUTH_SERVICE_URL".into(), "http://auth.internal:4001".into());
    map.insert("TASK_SERVICE_URL".into(), "http://task.internal:3000".into());
    for (k, v) in vars {
        map.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| map.get(key).cloned()).expect("test config")
}

/// Router wired to a test double instead of the HTTP forwarder.
pub fn app_with_forwarder(forwarder: Arc<dyn Forwarder>) -> Router {
    let config = test_config(&[]);
    let (auth, task) = backends(&config);
    let routes = RouteTable::new(default_rules(&auth, &task).expect("rules")).expect("table");
    let state = AppState::new(
        routes,
        build_identity_verifier(&config),
        forwarder,
        vec![auth, task],
        config.request_body_limit_bytes,
    );
    build_router(state, &config)
}

/// Router with the real reqwest forwarder.
pub fn app_with_config(config: &Config) -> Router {
    let state = build_state(config).expect("state");
    build_router(state, config)
}

pub fn token(subject: &str, role: Role) -> String {
    let assertion =
        IdentityAssertion::issue_now(subject, role, chrono::Duration::hours(1)).expect("assertion");
    TokenCodec::new(SECRET.as_bytes())
        .encode(&assertion)
        .expect("encode")
}

pub fn expired_token(subject: &str, role: Role) -> String {
    let now = Utc::now();
    let assertion = IdentityAssertion::new(
        subject,
        role,
        now - chrono::Duration::hours(2),
        now - chrono::Duration::hours(1),
    )
    .expect("assertion");
    TokenCodec::new(SECRET.as_bytes())
        .encode(&assertion)
        .expect("encode")
}

pub fn request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub target_url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub backend: String,
}

/// Records every forward call; answers 200 or fails like an unreachable backend.
#[derive(Default)]
pub struct RecordingForwarder {
    calls: Mutex<Vec<Recorded>>,
    unreachable: bool,
}

impl RecordingForwarder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            unreachable: true,
        })
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, request: ForwardRequest) -> Result<Response, ProxyError> {
        self.calls.lock().expect("lock").push(Recorded {
            method: request.method.clone(),
            target_url: request.target_url.to_string(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            backend: request.backend.name.clone(),
        });

        if self.unreachable {
            return Err(ProxyError::Connect("connection refused".into()));
        }
        Ok((StatusCode::OK, Json(json!({ "forwarded": true }))).into_response())
    }
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct MockBackend {
    pub url: String,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockBackend {
    pub fn captured(&self) -> Vec<Captured> {
        self.captured.lock().expect("lock").clone()
    }
}

async fn backend_handler(
    State(captured): State<Arc<Mutex<Vec<Captured>>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    captured.lock().expect("lock").push(Captured {
        method: method.clone(),
        uri: uri.to_string(),
        headers,
        body,
    });

    match (method, uri.path()) {
        (_, "/api/notes/slow") => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "slow": true })).into_response()
        }
        (Method::GET, "/api/projects/missing") => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Project not found" })),
        )
            .into_response(),
        (Method::DELETE, path) if path.starts_with("/api/projects/") => {
            Json(json!({ "message": "Project deleted successfully" })).into_response()
        }
        _ => Json(json!({ "ok": true })).into_response(),
    }
}

/// axum app on an ephemeral port that records every request it receives.
pub async fn spawn_backend() -> MockBackend {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .fallback(backend_handler)
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend");
    });

    MockBackend {
        url: format!("http://{addr}"),
        captured,
    }
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr
}

/// Raw HTTP backend that sends the response head at once, then the body in two
/// halves separated by `pause`.
pub async fn spawn_slow_body_backend(first: &'static str, second: &'static str, pause: Duration) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\n\r\n",
                    first.len() + second.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(first.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
                let _ = socket.write_all(second.as_bytes()).await;
                let _ = socket.flush().await;
            });
        }
    });

    format!("http://{addr}")
}
