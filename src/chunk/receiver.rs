use super::ChunkMeta;
use crate::error::{Result, ServerError};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

/// Order to seal one (recorder, session) pair, queued by the switch
/// detector and consumed by the seal worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealRequest {
    pub recorder_id: String,
    pub session_id: String,
}

/// Accepts uploaded chunks, stages them on disk, and detects when a
/// recorder has moved on to a new session.
///
/// The currently tracked session per recorder lives behind one mutex; the
/// transition decision happens inside the lock, so for any switch exactly
/// one caller observes the old value and queues the seal.
pub struct ChunkReceiver {
    chunk_root: PathBuf,
    session_root: PathBuf,
    tracked: Mutex<HashMap<String, String>>,
    seal_tx: mpsc::UnboundedSender<SealRequest>,
}

impl ChunkReceiver {
    pub fn new(
        chunk_root: PathBuf,
        session_root: PathBuf,
        seal_tx: mpsc::UnboundedSender<SealRequest>,
    ) -> Self {
        Self {
            chunk_root,
            session_root,
            tracked: Mutex::new(HashMap::new()),
            seal_tx,
        }
    }

    /// Stage one uploaded chunk and run switch detection.
    ///
    /// Duplicate chunk IDs overwrite their staged file. A chunk addressed
    /// to an already-sealed session is rejected and nothing is staged.
    pub async fn ingest(&self, meta: &ChunkMeta, payload: &[u8]) -> Result<()> {
        let sealed_dir = self
            .session_root
            .join(&meta.recorder_id)
            .join(&meta.session_id);
        if fs::try_exists(&sealed_dir).await.unwrap_or(false) {
            return Err(ServerError::SealedSession {
                recorder: meta.recorder_id.clone(),
                session: meta.session_id.clone(),
            });
        }

        let staging_dir = self
            .chunk_root
            .join(&meta.recorder_id)
            .join(&meta.session_id);
        fs::create_dir_all(&staging_dir).await?;

        // Write through a temp name so an aborted write never leaves a
        // partial chunk under the final name.
        let final_path = staging_dir.join(meta.staged_file_name());
        let tmp_path = staging_dir.join(format!(".{}.part", meta.staged_file_name()));

        if let Err(e) = fs::write(&tmp_path, payload).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        fs::rename(&tmp_path, &final_path).await?;

        info!(
            "[{}] staged chunk: session={} chunk={}",
            meta.recorder_id, meta.session_id, meta.chunk_id
        );

        if let Some(old_session) = self.track(&meta.recorder_id, &meta.session_id).await {
            info!(
                "[{}] session switch {} -> {}, sealing {}",
                meta.recorder_id, old_session, meta.session_id, old_session
            );
            let request = SealRequest {
                recorder_id: meta.recorder_id.clone(),
                session_id: old_session,
            };
            if self.seal_tx.send(request).is_err() {
                warn!("Seal worker is gone; dropping seal request");
            }
        }

        Ok(())
    }

    /// Update the tracked session for a recorder; returns the previous
    /// session exactly when this call flipped the value.
    async fn track(&self, recorder_id: &str, session_id: &str) -> Option<String> {
        let mut tracked = self.tracked.lock().await;
        match tracked.insert(recorder_id.to_string(), session_id.to_string()) {
            Some(old) if old != session_id => Some(old),
            _ => None,
        }
    }
}
