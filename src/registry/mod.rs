//! Sealed-session registry and TTL reaper.
//!
//! `refresh()` rescans the session root, evicts expired sessions, and
//! publishes a full replacement snapshot; `snapshot()` hands out the last
//! published state. Refresh runs on startup, on filesystem notifications,
//! and on a fallback interval, and always prefers a stale-but-complete
//! snapshot over a partial one.

use crate::chunk::decode_session_epoch;
use crate::error::{Result, ServerError};
use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const FALLBACK_REFRESH: Duration = Duration::from_secs(5 * 60);

/// One sealed session as reported by `GET /introspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedSession {
    pub id: String,
    pub wav_file_name: String,
    pub ogg_file_name: String,
    pub waveform_file_name: String,
    pub timestamp: DateTime<Utc>,
    pub hours_to_live: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderSessions {
    pub open_sessions: Vec<SealedSession>,
}

/// recorder ID -> its sealed sessions.
pub type RegistrySnapshot = HashMap<String, RecorderSessions>;

pub struct SessionRegistry {
    session_root: PathBuf,
    ttl_hours: f64,
    published: RwLock<RegistrySnapshot>,
}

impl SessionRegistry {
    pub fn new(session_root: PathBuf, ttl_hours: f64) -> Self {
        Self {
            session_root,
            ttl_hours,
            published: RwLock::new(HashMap::new()),
        }
    }

    /// Rescan the session root, delete expired sessions, and atomically
    /// replace the published snapshot. A scan error leaves the previously
    /// published snapshot untouched.
    pub async fn refresh(&self) -> Result<()> {
        let snapshot = self.scan().await?;
        *self.published.write().await = snapshot;
        Ok(())
    }

    /// The last published registry state.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.published.read().await.clone()
    }

    async fn scan(&self) -> Result<RegistrySnapshot> {
        let now = Utc::now();
        let mut snapshot = RegistrySnapshot::new();

        let mut recorders = fs::read_dir(&self.session_root).await.map_err(|e| {
            ServerError::Io(std::io::Error::other(format!(
                "cannot read recorders in {}: {}",
                self.session_root.display(),
                e
            )))
        })?;

        while let Some(recorder) = recorders.next_entry().await? {
            let recorder_id = recorder.file_name().to_string_lossy().into_owned();
            if recorder_id.starts_with('.') {
                continue;
            }

            let mut open_sessions = Vec::new();

            let sessions_path = recorder.path();
            let mut sessions = fs::read_dir(&sessions_path).await.map_err(|e| {
                ServerError::Io(std::io::Error::other(format!(
                    "cannot read sessions in {}: {}",
                    sessions_path.display(),
                    e
                )))
            })?;

            while let Some(session) = sessions.next_entry().await? {
                let session_id = session.file_name().to_string_lossy().into_owned();
                if session_id.starts_with('.') {
                    continue;
                }

                let created = decode_session_epoch(&session_id).ok_or_else(|| {
                    ServerError::Validation(format!("cannot parse epoch: {}", session_id))
                })?;

                let elapsed_hours =
                    (now - created).num_milliseconds() as f64 / 3_600_000.0;
                let hours_to_live = self.ttl_hours - elapsed_hours;
                info!(
                    "Session [{}] has {:.2} hours left, before it gets deleted",
                    session_id, hours_to_live
                );

                if hours_to_live < 0.0 {
                    let to_delete = session.path();
                    info!("Attempting to delete: {}", to_delete.display());
                    if let Err(e) = fs::remove_dir_all(&to_delete).await {
                        warn!("Cannot remove folder {}: {}", to_delete.display(), e);
                    }
                    continue;
                }

                open_sessions.push(SealedSession {
                    id: session_id,
                    wav_file_name: "data.wav".to_string(),
                    ogg_file_name: "data.ogg".to_string(),
                    waveform_file_name: "waveform.dat".to_string(),
                    timestamp: created,
                    hours_to_live,
                });
            }

            snapshot.insert(recorder_id, RecorderSessions { open_sessions });
        }

        Ok(snapshot)
    }
}

/// Keep the registry fresh: refresh immediately, then on every change
/// notification for the session root, and on a fallback interval in case
/// notifications are missed.
pub fn spawn_registry_watcher(
    registry: Arc<SessionRegistry>,
    session_root: PathBuf,
) -> anyhow::Result<JoinHandle<()>> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let _ = tx.send(event);
    })?;
    watcher.watch(&session_root, RecursiveMode::Recursive)?;

    let handle = tokio::spawn(async move {
        // The watcher must stay alive as long as this task runs.
        let _watcher = watcher;

        let mut ticker = tokio::time::interval(FALLBACK_REFRESH);

        loop {
            tokio::select! {
                // First tick fires immediately and doubles as the startup
                // refresh.
                _ = ticker.tick() => {
                    info!("Checking sessions directory");
                    if let Err(e) = registry.refresh().await {
                        error!("Registry refresh failed: {}", e);
                    }
                    info!("Checking sessions directory - Done.");
                }
                event = rx.recv() => match event {
                    Some(Ok(_)) => {
                        if let Err(e) = registry.refresh().await {
                            error!("Registry refresh failed: {}", e);
                        }
                    }
                    Some(Err(e)) => warn!("Watcher error: {}", e),
                    None => break,
                },
            }
        }

        info!("Registry watcher stopped");
    });

    Ok(handle)
}
