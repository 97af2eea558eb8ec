/*
 * Responsibility
 * - GET /api/status (gateway の稼働状況と backend 一覧)
 */
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub gateway: &'static str,
    pub version: &'static str,
    pub services: Vec<ServiceEntry>,
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let services = state
        .backends
        .iter()
        .map(|b| ServiceEntry {
            name: b.name.clone(),
            url: b.base_url.to_string(),
        })
        .collect();

    Json(StatusResponse {
        gateway: "online",
        version: env!("CARGO_PKG_VERSION"),
        services,
    })
}
