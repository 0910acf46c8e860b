use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Uploaded chunks stay small; 10 MiB leaves generous headroom.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, session_root: &Path) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chunk ingestion
        .route("/upload", post(handlers::upload_chunk))
        // Registry snapshot
        .route("/introspect", get(handlers::introspect))
        // Segment rendering
        .route("/render", post(handlers::render))
        // Direct retrieval of sealed session artifacts
        .nest_service("/sessions", ServeDir::new(session_root))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // The web frontend is served from elsewhere
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
