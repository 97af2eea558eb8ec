/*
 * Responsibility
 * - gateway 自身が応答する endpoint (routes() の re-export など)
 * - それ以外は fallback として Front Door に流す
 */
pub mod handlers;
mod routes;

pub use routes::routes;
