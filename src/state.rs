/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - routes: 起動時に一度だけ組み立てた RouteTable (read-only)
 *   - verifier: token 検証 (signing secret を内包)
 *   - forwarder: backend への転送 (テストでは差し替え可能)
 * - Clone 前提で持つ (内部は Arc)
 */
use std::sync::Arc;
use std::time::Instant;

use crate::gateway::proxy::Forwarder;
use crate::gateway::route_table::{BackendTarget, RouteTable};
use crate::services::auth::IdentityVerifier;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub verifier: Arc<IdentityVerifier>,
    pub forwarder: Arc<dyn Forwarder>,
    pub backends: Arc<Vec<BackendTarget>>,
    pub started_at: Instant,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(
        routes: RouteTable,
        verifier: Arc<IdentityVerifier>,
        forwarder: Arc<dyn Forwarder>,
        backends: Vec<BackendTarget>,
        body_limit: usize,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            verifier,
            forwarder,
            backends: Arc::new(backends),
            started_at: Instant::now(),
            body_limit,
        }
    }
}
