/*
 * Responsibility
 * - GET /health (疎通用, 認証なし)
 * - process の uptime と設定済み backend URL を返す
 */
use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub services: BTreeMap<String, String>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let services = state
        .backends
        .iter()
        .map(|b| (b.name.clone(), b.base_url.to_string()))
        .collect();

    let body = HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services,
    };

    (StatusCode::OK, Json(body))
}
