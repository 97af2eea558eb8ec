/*
 * Responsibility
 * - gateway ローカルの URL 構造を定義 (/health, /api/status)
 * - 残りは全て fallback (Front Door) で RouteTable に委ねる
 * - method 違い (POST /health など) も Front Door に流し 404 に揃える
 */
use axum::{Router, routing::get};

use crate::api::handlers::{health::health, status::status};
use crate::gateway::front_door;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .fallback(front_door)
        // wrong method on a local path: same 404 body as any unknown route
        .method_not_allowed_fallback(front_door)
}
