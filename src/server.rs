//! HTTP server: health probe, WebSocket endpoint and the static front-end.

use crate::channel::websocket::websocket_handler;
use crate::config::Config;
use crate::session::SessionFactory;
use anyhow::{Context, Result};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared across all connections
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub factory: Arc<dyn SessionFactory>,
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

pub fn router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.bind, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    tracing::info!(
        "Serving front-end from {:?}, bridge at {}",
        state.config.server.static_dir,
        state.config.bridge.base_url
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
