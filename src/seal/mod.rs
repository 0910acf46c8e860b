//! Session sealing: assembling staged chunks into an immutable, published
//! recording with derivative formats and waveform artifacts.

use crate::chunk::SealRequest;
use crate::error::{Result, ServerError};
use crate::tools::{Transcoder, WaveformRenderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Canonical master format: 48 kHz, 16-bit, stereo, little-endian signed.
const MASTER_SAMPLE_RATE: u32 = 48_000;
const MASTER_BIT_DEPTH: u32 = 16;
const MASTER_CHANNELS: u32 = 2;

const OVERVIEW_WIDTH: u32 = 1_000;
const FULL_WIDTH: u32 = 10_000;
const WAVEFORM_HEIGHT: u32 = 200;
const PEAKS_ZOOM: u32 = 256;
const PEAKS_BITS: u32 = 8;

/// Assembles staged chunks for one (recorder, session) into a sealed
/// session directory.
///
/// Everything is built inside a uuid-named work directory and published
/// with one rename, so a half-finished seal is never visible under the
/// session root. A destination that already exists means the session was
/// sealed by an earlier run and the call is a no-op.
pub struct Sealer {
    chunk_root: PathBuf,
    session_root: PathBuf,
    work_root: PathBuf,
    transcoder: Arc<dyn Transcoder>,
    waveform: Arc<dyn WaveformRenderer>,
}

impl Sealer {
    pub fn new(
        chunk_root: PathBuf,
        session_root: PathBuf,
        work_root: PathBuf,
        transcoder: Arc<dyn Transcoder>,
        waveform: Arc<dyn WaveformRenderer>,
    ) -> Self {
        Self {
            chunk_root,
            session_root,
            work_root,
            transcoder,
            waveform,
        }
    }

    /// Seal one session. Idempotent: a second call for an already-published
    /// session returns Ok without touching the artifact set.
    pub async fn seal(&self, recorder_id: &str, session_id: &str) -> Result<()> {
        let dest = self.session_root.join(recorder_id).join(session_id);
        if fs::try_exists(&dest).await.unwrap_or(false) {
            info!(
                "[{}] session {} already sealed, nothing to do",
                recorder_id, session_id
            );
            return Ok(());
        }

        let staging = self.chunk_root.join(recorder_id).join(session_id);
        if !fs::try_exists(&staging).await.unwrap_or(false) {
            return Err(ServerError::NotFound(format!(
                "no staged chunks for {}/{}",
                recorder_id, session_id
            )));
        }

        info!("[{}] sealing session {}", recorder_id, session_id);

        let work_dir = self
            .work_root
            .join(format!("{}-{}-{}", recorder_id, session_id, Uuid::new_v4()));

        match self.build(&staging, &work_dir).await {
            Ok(()) => self.publish(&work_dir, &dest, recorder_id, session_id).await,
            Err(e) => {
                let _ = fs::remove_dir_all(&work_dir).await;
                Err(e)
            }
        }
    }

    /// Assemble the master and every derivative inside `work_dir`.
    async fn build(&self, staging: &Path, work_dir: &Path) -> Result<()> {
        fs::create_dir_all(work_dir).await?;

        let raw_path = work_dir.join("data.raw");
        self.assemble_raw(staging, &raw_path).await?;

        // The staged chunks are consumed once the master exists.
        fs::remove_dir_all(staging).await?;

        let wav_path = work_dir.join("data.wav");
        self.transcoder
            .convert(
                &raw_path,
                &wav_path,
                MASTER_SAMPLE_RATE,
                MASTER_BIT_DEPTH,
                MASTER_CHANNELS,
            )
            .await?;
        self.transcoder
            .convert(
                &raw_path,
                &work_dir.join("data.ogg"),
                MASTER_SAMPLE_RATE,
                MASTER_BIT_DEPTH,
                MASTER_CHANNELS,
            )
            .await?;

        fs::remove_file(&raw_path).await?;

        self.waveform
            .render_image(
                &wav_path,
                &work_dir.join("overview.png"),
                OVERVIEW_WIDTH,
                WAVEFORM_HEIGHT,
            )
            .await?;
        self.waveform
            .render_image(
                &wav_path,
                &work_dir.join("full.png"),
                FULL_WIDTH,
                WAVEFORM_HEIGHT,
            )
            .await?;
        self.waveform
            .render_peaks(
                &wav_path,
                &work_dir.join("waveform.dat"),
                PEAKS_ZOOM,
                PEAKS_BITS,
            )
            .await?;

        Ok(())
    }

    /// Concatenate staged chunk payloads, ascending by chunk ID, into one
    /// raw master stream. Arrival order is irrelevant: chunk IDs are
    /// zero-padded, so the sorted file names are the chunk order.
    async fn assemble_raw(&self, staging: &Path, raw_path: &Path) -> Result<()> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();

        // Append chunk by chunk; a session can run for hours, so the
        // master must never be buffered whole.
        let mut master = fs::File::create(raw_path).await?;
        let mut total = 0usize;
        for name in &names {
            let payload = fs::read(staging.join(name)).await?;
            total += payload.len();
            master.write_all(&payload).await?;
        }
        master.flush().await?;

        info!(
            "Assembled {} chunks ({} bytes) into {}",
            names.len(),
            total,
            raw_path.display()
        );

        Ok(())
    }

    /// Atomically move the finished work directory into place. Losing the
    /// rename race to a concurrent seal counts as success.
    async fn publish(
        &self,
        work_dir: &Path,
        dest: &Path,
        recorder_id: &str,
        session_id: &str,
    ) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(work_dir, dest).await {
            let _ = fs::remove_dir_all(work_dir).await;
            if fs::try_exists(dest).await.unwrap_or(false) {
                info!(
                    "[{}] session {} sealed concurrently elsewhere",
                    recorder_id, session_id
                );
                return Ok(());
            }
            return Err(e.into());
        }

        info!("[{}] successfully sealed session {}", recorder_id, session_id);
        Ok(())
    }

    /// Re-trigger sealing for every (recorder, session) still present under
    /// the chunk root. Run at startup to finish work interrupted by a
    /// crash or shutdown.
    pub async fn sweep(&self) {
        let mut recorders = match fs::read_dir(&self.chunk_root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cannot read chunk root {}: {}",
                    self.chunk_root.display(),
                    e
                );
                return;
            }
        };

        loop {
            let recorder = match recorders.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Cannot walk chunk root: {}", e);
                    break;
                }
            };
            let recorder_id = recorder.file_name().to_string_lossy().into_owned();

            let mut sessions = match fs::read_dir(recorder.path()).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read sessions of {}: {}", recorder_id, e);
                    continue;
                }
            };

            while let Ok(Some(session)) = sessions.next_entry().await {
                let session_id = session.file_name().to_string_lossy().into_owned();
                info!("Sweep: sealing leftover session {}/{}", recorder_id, session_id);
                if let Err(e) = self.seal(&recorder_id, &session_id).await {
                    error!("Sweep seal of {}/{} failed: {}", recorder_id, session_id, e);
                }
            }
        }
    }
}

/// Consume queued seal requests, running each seal as its own task so one
/// slow or failing seal never delays the next.
pub fn spawn_seal_worker(
    sealer: Arc<Sealer>,
    mut requests: mpsc::UnboundedReceiver<SealRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Seal worker started");

        while let Some(request) = requests.recv().await {
            let sealer = Arc::clone(&sealer);
            tokio::spawn(async move {
                if let Err(e) = sealer
                    .seal(&request.recorder_id, &request.session_id)
                    .await
                {
                    error!(
                        "Seal of {}/{} failed: {}",
                        request.recorder_id, request.session_id, e
                    );
                }
            });
        }

        info!("Seal worker stopped");
    })
}
