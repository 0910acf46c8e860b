//! HTTP surface of the server:
//! - POST /upload - multipart chunk ingestion
//! - GET /introspect - registry snapshot with remaining TTLs
//! - POST /render - asynchronous segment rendering
//! - GET /sessions/... - static serving of sealed session artifacts
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
