//! Rendering named segments of a sealed session into tagged, distributable
//! audio files.
//!
//! Requests are accepted FIFO through a bounded intake channel and
//! acknowledged immediately; the actual trim/tag jobs run afterwards,
//! concurrently up to a configured cap, with failures isolated per job.

use crate::config::RenderConfig;
use crate::error::{Result, ServerError};
use crate::tools::{TagWriter, TrackTags, Transcoder};
use chrono::{Datelike, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Fade length applied at both segment edges, in seconds.
const FADE_SECS: f32 = 0.8;
/// Peak normalization target in dBFS.
const NORM_DB: f32 = -0.1;

/// A named cut mark within a sealed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "labelText")]
    pub label_text: String,
    #[serde(rename = "startTime")]
    pub start_time: f32,
    #[serde(rename = "endTime")]
    pub end_time: f32,
    pub filetypes: Vec<String>,
}

/// Request to render a set of segments of one sealed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub segments: HashMap<String, Segment>,
    #[serde(rename = "recorderID")]
    pub recorder_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Fans a render request out into per-(segment, filetype) trim/tag jobs.
pub struct RenderCoordinator {
    session_root: PathBuf,
    recordings_root: PathBuf,
    config: RenderConfig,
    transcoder: Arc<dyn Transcoder>,
    tag_writer: Arc<dyn TagWriter>,
}

impl RenderCoordinator {
    pub fn new(
        session_root: PathBuf,
        recordings_root: PathBuf,
        config: RenderConfig,
        transcoder: Arc<dyn Transcoder>,
        tag_writer: Arc<dyn TagWriter>,
    ) -> Self {
        Self {
            session_root,
            recordings_root,
            config,
            transcoder,
            tag_writer,
        }
    }

    /// Check a request before accepting it: segments well-formed and the
    /// sealed master present.
    pub async fn validate(&self, request: &RenderRequest) -> Result<()> {
        if request.recorder_id.is_empty() || request.session_id.is_empty() {
            return Err(ServerError::Validation(
                "recorderID and sessionID are required".to_string(),
            ));
        }
        if request.segments.is_empty() {
            return Err(ServerError::Validation(
                "request contains no segments".to_string(),
            ));
        }

        for (name, segment) in &request.segments {
            if segment.label_text.is_empty() {
                return Err(ServerError::Validation(format!(
                    "segment {} has no label",
                    name
                )));
            }
            if segment.filetypes.is_empty() {
                return Err(ServerError::Validation(format!(
                    "segment {} requests no filetypes",
                    name
                )));
            }
            if segment.start_time < 0.0 || segment.end_time <= segment.start_time {
                return Err(ServerError::Validation(format!(
                    "segment {} has an invalid time range [{}, {}]",
                    name, segment.start_time, segment.end_time
                )));
            }
        }

        let master = self.master_path(request);
        if !fs::try_exists(&master).await.unwrap_or(false) {
            return Err(ServerError::NotFound(format!(
                "no sealed session {}/{}",
                request.recorder_id, request.session_id
            )));
        }

        Ok(())
    }

    /// Run every (segment, filetype) job of the request, at most
    /// `max_parallel_jobs` at a time. Job failures are logged and never
    /// cancel sibling jobs.
    pub async fn execute(&self, request: RenderRequest) {
        let source = self.master_path(&request);

        let mut jobs = Vec::new();
        for segment in request.segments.into_values() {
            for filetype in &segment.filetypes {
                jobs.push((segment.clone(), filetype.clone()));
            }
        }

        let total = jobs.len();
        info!(
            "Rendering {} jobs for {}/{}",
            total, request.recorder_id, request.session_id
        );

        stream::iter(jobs)
            .for_each_concurrent(self.config.max_parallel_jobs, |(segment, filetype)| {
                let source = source.clone();
                async move {
                    if let Err(e) = self.render_job(&source, &segment, &filetype).await {
                        error!(
                            "Cannot render segment {} as {}: {}",
                            segment.label_text, filetype, e
                        );
                    }
                }
            })
            .await;

        info!(
            "Render of {}/{} finished ({} jobs)",
            request.recorder_id, request.session_id, total
        );
    }

    async fn render_job(&self, source: &Path, segment: &Segment, filetype: &str) -> Result<()> {
        let file_name = format!(
            "{}{}.{}",
            self.config.file_prefix,
            sanitize_label(&segment.label_text),
            filetype
        );
        let dest = self.recordings_root.join(file_name);

        info!("Create: {}", dest.display());
        self.transcoder
            .trim(
                source,
                &dest,
                segment.start_time,
                segment.end_time,
                FADE_SECS,
                NORM_DB,
            )
            .await?;
        info!("Create: {} - Done.", dest.display());

        let cover = match fs::read(&self.config.cover_image).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(
                    "Cannot read artwork {}: {}",
                    self.config.cover_image.display(),
                    e
                );
                None
            }
        };

        info!("Write tag: {}", dest.display());
        let tags = TrackTags {
            artist: self.config.artist.clone(),
            title: self.config.title.clone(),
            year: Utc::now().year(),
            album: self.config.album.clone(),
        };

        // Stamping rewrites the whole rendered file to prepend the tag
        // header; keep that off the async worker threads.
        let tag_writer = Arc::clone(&self.tag_writer);
        let stamp_path = dest.clone();
        tokio::task::spawn_blocking(move || tag_writer.stamp(&stamp_path, &tags, cover.as_deref()))
            .await
            .map_err(|e| ServerError::Io(std::io::Error::other(e)))??;
        info!("Write tag: {} - Done.", dest.display());

        Ok(())
    }

    fn master_path(&self, request: &RenderRequest) -> PathBuf {
        self.session_root
            .join(&request.recorder_id)
            .join(&request.session_id)
            .join("data.wav")
    }
}

/// Distinct (segment, filetype) pairs get distinct file names by
/// construction; anything outside `[A-Za-z0-9._-]` becomes an underscore.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Drain the intake queue one request at a time. Acceptance stays FIFO and
/// the per-request job cap doubles as the global subprocess cap.
pub fn spawn_render_worker(
    coordinator: Arc<RenderCoordinator>,
    mut requests: mpsc::Receiver<RenderRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Render worker started");

        while let Some(request) = requests.recv().await {
            info!(
                "RenderRequest for {}/{} with {} segments",
                request.recorder_id,
                request.session_id,
                request.segments.len()
            );
            coordinator.execute(request).await;
        }

        info!("Render worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::sanitize_label;

    #[test]
    fn keeps_safe_characters() {
        assert_eq!(sanitize_label("intro"), "intro");
        assert_eq!(sanitize_label("part-2.final"), "part-2.final");
    }

    #[test]
    fn replaces_spaces_and_separators() {
        assert_eq!(sanitize_label("opening words"), "opening_words");
        assert_eq!(sanitize_label("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_label("käse"), "k_se");
    }
}
