use super::state::AppState;
use crate::chunk::ChunkMeta;
use crate::error::ServerError;
use crate::render::RenderRequest;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

/// Multipart form field carrying the chunk payload.
const UPLOAD_FIELD: &str = "raw_audio";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub recorder_id: String,
    pub session_id: String,
    pub chunk_id: String,
}

#[derive(Debug, Serialize)]
pub struct RenderAccepted {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: &ServerError) -> (StatusCode, Json<ErrorResponse>) {
    (
        err.status_code(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /upload
/// Accept one chunk; the source filename carries recorder/session/chunk
/// identity. Returns as soon as the chunk is staged.
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let err = ServerError::Validation(format!("malformed multipart body: {}", e));
                return error_response(&err).into_response();
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let err = ServerError::Validation("upload field has no filename".to_string());
            return error_response(&err).into_response();
        };

        match field.bytes().await {
            Ok(bytes) => {
                upload = Some((file_name, bytes.to_vec()));
                break;
            }
            Err(e) => {
                let err = ServerError::Validation(format!("cannot read upload body: {}", e));
                return error_response(&err).into_response();
            }
        }
    }

    let Some((file_name, payload)) = upload else {
        let err = ServerError::Validation(format!("missing form field: {}", UPLOAD_FIELD));
        return error_response(&err).into_response();
    };

    let meta = match ChunkMeta::parse(&file_name) {
        Ok(meta) => meta,
        Err(e) => {
            error!("Rejected upload {}: {}", file_name, e);
            return error_response(&e).into_response();
        }
    };

    if let Err(e) = state.receiver.ingest(&meta, &payload).await {
        error!(
            "Ingest of {}/{}/{} failed: {}",
            meta.recorder_id, meta.session_id, meta.chunk_id, e
        );
        return error_response(&e).into_response();
    }

    (
        StatusCode::OK,
        Json(UploadResponse {
            status: "stored".to_string(),
            recorder_id: meta.recorder_id,
            session_id: meta.session_id,
            chunk_id: meta.chunk_id,
        }),
    )
        .into_response()
}

/// GET /introspect
/// The last published registry snapshot: recorder -> sessions with
/// remaining TTL in hours.
pub async fn introspect(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    (StatusCode::OK, Json(snapshot))
}

/// POST /render
/// Validate and enqueue a render request. The response only acknowledges
/// acceptance; rendering completes in the background.
pub async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.render.validate(&request).await {
        error!(
            "Rejected render request for {}/{}: {}",
            request.recorder_id, request.session_id, e
        );
        return error_response(&e).into_response();
    }

    info!(
        "Accepted render request for {}/{} ({} segments)",
        request.recorder_id,
        request.session_id,
        request.segments.len()
    );

    if state.render_tx.send(request).await.is_err() {
        let err = ServerError::Io(std::io::Error::other("render worker is gone"));
        return error_response(&err).into_response();
    }

    (
        StatusCode::OK,
        Json(RenderAccepted {
            status: "accepted".to_string(),
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
