pub mod config;
pub mod decoder;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod sanitize;
pub mod state;
pub mod upstream;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use config::RelayConfig;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use upstream::{http::HttpUpstream, ChatUpstream};

pub fn build_state(config: RelayConfig) -> Result<state::AppState, std::io::Error> {
    let upstream = HttpUpstream::new(&config).map_err(std::io::Error::other)?;
    info!(
        upstream = upstream.name(),
        url = %config.api_url,
        model = %config.model,
        timeout_ms = config.upstream_timeout.as_millis() as u64,
        "upstream configured"
    );
    Ok(state::AppState::new(config, Arc::new(upstream)))
}

pub fn build_app(state: state::AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route("/chat", post(handlers::chat))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
