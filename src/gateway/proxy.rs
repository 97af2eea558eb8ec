//! Forwarding proxy.
//!
//! Responsibility:
//! - build the outbound request (trusted identity headers, client bearer as-is)
//! - relay the backend response verbatim (status / headers / streamed body)
//! - classify transport failures; upstream error statuses are NOT failures
//!
//! No retries, no caching, no body rewriting.
//!
//! Trust boundary:
//! - backends believe `x-user-id` / `x-user-role` only because the gateway is
//!   their sole ingress. Client-supplied copies are dropped here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, header};
use axum::response::Response;
use thiserror::Error;
use url::Url;

use crate::gateway::route_table::{BackendTarget, RouteMatch};
use crate::services::auth::verifier::VerifiedIdentity;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream connection failed: {0}")]
    Connect(String),
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
    #[error("subject id cannot be sent as a header")]
    InvalidIdentity,
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else if e.is_connect() {
            ProxyError::Connect(e.to_string())
        } else {
            ProxyError::Transport(e.to_string())
        }
    }
}

/// Everything the proxy needs for one authorized request.
/// Owned by that request; never shared.
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    pub target_url: Url,
    /// Outbound headers, identity headers already applied.
    pub headers: HeaderMap,
    pub body: Bytes,
    pub identity: Option<VerifiedIdentity>,
    pub route: String,
    pub backend: BackendTarget,
}

impl ForwardRequest {
    pub fn new(
        method: Method,
        uri: &Uri,
        inbound_headers: &HeaderMap,
        body: Bytes,
        matched: &RouteMatch<'_>,
        identity: Option<VerifiedIdentity>,
    ) -> Result<Self, ProxyError> {
        let rule = matched.rule;
        let mut path_and_query = rule.upstream_path(uri.path());
        if let Some(query) = uri.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let target_url = resolve_target(&rule.backend.base_url, &path_and_query)?;
        let headers = outbound_headers(inbound_headers, identity.as_ref())?;

        Ok(Self {
            method,
            target_url,
            headers,
            body,
            identity,
            route: rule.to_string(),
            backend: rule.backend.clone(),
        })
    }
}

fn resolve_target(base: &Url, path_and_query: &str) -> Result<Url, ProxyError> {
    let raw = format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query);
    Url::parse(&raw).map_err(|e| ProxyError::InvalidTarget(format!("{raw}: {e}")))
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Inbound headers minus hop-by-hop / host / spoofed identity, plus our identity.
/// `authorization` passes through unchanged.
pub fn outbound_headers(
    inbound: &HeaderMap,
    identity: Option<&VerifiedIdentity>,
) -> Result<HeaderMap, ProxyError> {
    let mut out = HeaderMap::with_capacity(inbound.len() + 2);
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == X_USER_ID
            || name == X_USER_ROLE
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }

    if let Some(identity) = identity {
        let id = HeaderValue::from_str(&identity.subject_id)
            .map_err(|_| ProxyError::InvalidIdentity)?;
        out.insert(X_USER_ID, id);
        out.insert(X_USER_ROLE, HeaderValue::from_static(identity.role.as_str()));
    }

    Ok(out)
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> Result<Response, ProxyError>;
}

/// reqwest-backed forwarder.
///
/// `timeout` bounds connecting and waiting for the response head only. Once the
/// status is relayed the body streams without a deadline, so a relayed response
/// is never cut short by the gateway.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProxyError::Transport(e.to_string()))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: ForwardRequest) -> Result<Response, ProxyError> {
        let started = Instant::now();
        let ForwardRequest {
            method,
            target_url,
            headers,
            body,
            identity,
            route,
            backend,
        } = request;

        let mut outbound = self.client.request(method, target_url).headers(headers);
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        let upstream = tokio::time::timeout(self.timeout, outbound.send())
            .await
            .map_err(|_| ProxyError::Timeout)??;
        let status = upstream.status();

        tracing::info!(
            route = %route,
            backend = %backend.name,
            subject = identity.as_ref().map(|i| i.subject_id.as_str()).unwrap_or("-"),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upstream responded"
        );

        let mut response_headers = HeaderMap::with_capacity(upstream.headers().len());
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                response_headers.append(name.clone(), value.clone());
            }
        }

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}
