/*
 * Responsibility
 * - Config読み込み → 依存生成 (RouteTable / IdentityVerifier / Forwarder) → Router 組み立て
 * - Middleware の適用 (HTTP / CORS / Security headers)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::gateway::{BackendTarget, HttpForwarder, RouteTable, default_rules};
use crate::middleware;
use crate::services::auth::build_identity_verifier;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG=info,task_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // development: crash the whole process so we notice immediately
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "refusing to start");
            return Err(err.into());
        }
    };

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    for route in state.routes.describe() {
        tracing::debug!(%route, "route registered");
    }

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("gateway stopped");
    Ok(())
}

pub fn backends(config: &Config) -> (BackendTarget, BackendTarget) {
    (
        BackendTarget::new("auth", config.auth_service_url.clone()),
        BackendTarget::new("task", config.task_service_url.clone()),
    )
}

/// Process-level services, injected into the shared application state.
pub fn build_state(config: &Config) -> Result<AppState> {
    let (auth, task) = backends(config);
    let routes = RouteTable::new(default_rules(&auth, &task)?)?;

    let verifier = build_identity_verifier(config);
    let forwarder = HttpForwarder::new(config.upstream_timeout)?;

    Ok(AppState::new(
        routes,
        verifier,
        Arc::new(forwarder),
        vec![auth, task],
        config.request_body_limit_bytes,
    ))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes().with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router, config)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
