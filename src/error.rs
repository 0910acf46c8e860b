use axum::http::StatusCode;
use thiserror::Error;

/// Failure taxonomy shared by the HTTP surface and the background workers.
///
/// Synchronous handlers map these onto 4xx/5xx responses; background units
/// (seal, reap pass, render job) log them and abort only their own unit.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed upload filename or render request body.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Referenced recorder/session/chunk does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Chunk addressed to a session that has already been sealed.
    #[error("session {session} of recorder {recorder} is already sealed")]
    SealedSession { recorder: String, session: String },

    /// Disk read/write/rename failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// External transcode/waveform tool missing or exited non-zero.
    #[error("{tool} failed: {message}")]
    Subprocess { tool: String, message: String },
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::SealedSession { .. } => StatusCode::CONFLICT,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Subprocess { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
