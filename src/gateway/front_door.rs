//! Gateway front door.
//!
//! Responsibility:
//! - single entry point for every request that is not a gateway-local endpoint
//! - strictly linear pipeline: match -> verify -> authorize -> forward
//! - paths with dot segments are refused before matching
//! - every failure ends as exactly one `AppError` response
//!
//! Mounted as the Router fallback, so axum's own routes (/health, /api/status)
//! are resolved first.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, header};
use axum::response::Response;

use crate::error::AppError;
use crate::gateway::proxy::{ForwardRequest, ProxyError};
use crate::gateway::route_table::is_canonical_path;
use crate::services::auth::policy::{Decision, DenyReason, authorize};
use crate::services::auth::verifier::{CredentialError, VerifiedIdentity, token_fingerprint};
use crate::state::AppState;

/// Routes answered by the gateway itself, listed next to the forwarded ones on 404.
pub const LOCAL_ROUTES: [&str; 2] = ["GET /health", "GET /api/status"];

pub async fn front_door(State(state): State<AppState>, request: Request) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path();

    // Dot segments would be resolved away when the upstream URL is built,
    // so the matched rule would not guard the path actually forwarded.
    if !is_canonical_path(path) {
        tracing::warn!(%method, path, "rejected non-canonical path");
        return Err(AppError::bad_request("request path must not contain dot segments"));
    }

    // Received -> Matched
    let Some(matched) = state.routes.match_route(&method, path) else {
        tracing::debug!(%method, path, "no matching route");
        return Err(AppError::route_not_found(
            method,
            path,
            available_routes(&state),
        ));
    };
    let rule = matched.rule;

    // Matched -> Verified | Unauthenticated
    // A non-UTF8 header is treated as present but malformed.
    let credential = parts
        .headers
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    let identity: Option<VerifiedIdentity> = if rule.requirement.requires_identity() {
        match state.verifier.verify(credential) {
            Ok(identity) => Some(identity),
            Err(err) => {
                log_credential_failure(&method, path, credential, err);
                return Err(AppError::Unauthorized);
            }
        }
    } else {
        state.verifier.try_verify(credential)
    };

    // Verified -> Authorized
    match authorize(identity.as_ref(), &rule.requirement) {
        Decision::Allow => {}
        Decision::Deny(DenyReason::Unauthenticated) => return Err(AppError::Unauthorized),
        Decision::Deny(DenyReason::Forbidden) => {
            tracing::info!(
                %method,
                path,
                route = %rule,
                role = identity.as_ref().map(|i| i.role.as_str()).unwrap_or("-"),
                required = %rule.requirement,
                "access denied"
            );
            return Err(AppError::forbidden(rule.requirement.to_string()));
        }
    }

    let body = read_body(body, state.body_limit).await?;

    let forward = ForwardRequest::new(method.clone(), &parts.uri, &parts.headers, body, &matched, identity)
        .map_err(|err| {
            tracing::error!(%method, path, route = %rule, error = %err, "cannot build upstream request");
            AppError::Internal
        })?;

    // Authorized -> Forwarded -> Responded
    let service = forward.backend.name.clone();
    state.forwarder.forward(forward).await.map_err(|err| {
        log_proxy_failure(&method, path, &service, &err);
        AppError::service_unavailable(service)
    })
}

/// Every route a caller can reach, in match order.
pub fn available_routes(state: &AppState) -> Vec<String> {
    LOCAL_ROUTES
        .iter()
        .map(|r| r.to_string())
        .chain(state.routes.describe())
        .collect()
}

async fn read_body(body: Body, limit: usize) -> Result<axum::body::Bytes, AppError> {
    to_bytes(body, limit).await.map_err(|err| {
        tracing::warn!(error = %err, "failed to read request body");
        AppError::bad_request("request body could not be read")
    })
}

fn log_credential_failure(method: &Method, path: &str, credential: Option<&str>, err: CredentialError) {
    let fingerprint = credential.map(token_fingerprint);
    tracing::warn!(
        %method,
        path,
        reason = %err,
        fingerprint = fingerprint.as_deref().unwrap_or("-"),
        "credential rejected"
    );
}

fn log_proxy_failure(method: &Method, path: &str, service: &str, err: &ProxyError) {
    tracing::error!(%method, path, service, error = %err, "upstream unavailable");
}
