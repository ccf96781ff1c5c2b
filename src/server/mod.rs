// src/server/mod.rs

use crate::agent::Agent;
use crate::config::Config;
use anyhow::Result;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod handlers;
mod tls;

/// Waits for SIGINT or SIGTERM.
async fn await_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: Arc<dyn Agent>,
}

/// Runs the mutually-authenticated HTTPS control plane until the process
/// receives a shutdown signal.
pub async fn run(config: Config, agent: Arc<dyn Agent>) -> Result<()> {
    let tls_config = tls::build(&config).await?;
    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        agent,
    };

    let protected = Router::new()
        .route("/make-leader", post(handlers::make_leader))
        .route("/make-follower", post(handlers::make_follower))
        .route("/make-read-only", post(handlers::make_read_only))
        .route("/sync", post(handlers::sync))
        .route("/status", get(handlers::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_basic_auth));

    let app = Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(protected)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("agent control plane listening on https://{addr}");

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            await_shutdown_signal().await;
            handle.graceful_shutdown(None);
        }
    });

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
