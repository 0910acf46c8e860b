// Mock collaborators shared by the integration tests: transcoding is
// replaced with byte copies / marker files so tests never need sox or
// audiowaveform installed.
#![allow(dead_code)]

use async_trait::async_trait;
use fieldtape::error::{Result, ServerError};
use fieldtape::tools::{TagWriter, TrackTags, Transcoder, WaveformRenderer};
use std::path::Path;
use tokio::fs;

/// Transcoder that copies the source bytes verbatim for `convert` and
/// writes a marker describing the cut for `trim`.
pub struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn convert(
        &self,
        source: &Path,
        dest: &Path,
        _sample_rate: u32,
        _bit_depth: u32,
        _channels: u32,
    ) -> Result<()> {
        fs::copy(source, dest).await?;
        Ok(())
    }

    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        start: f32,
        end: f32,
        fade_secs: f32,
        norm_db: f32,
    ) -> Result<()> {
        let marker = format!(
            "trim {}..{} fade {} norm {} of {}",
            start,
            end,
            fade_secs,
            norm_db,
            source.display()
        );
        fs::write(dest, marker).await?;
        Ok(())
    }
}

/// Transcoder whose jobs fail for one destination extension, to exercise
/// failure isolation.
pub struct FailingTranscoder {
    pub fail_ext: String,
}

impl FailingTranscoder {
    fn should_fail(&self, dest: &Path) -> bool {
        dest.extension()
            .map(|ext| ext.to_string_lossy() == self.fail_ext.as_str())
            .unwrap_or(false)
    }

    fn failure(&self) -> ServerError {
        ServerError::Subprocess {
            tool: "sox".to_string(),
            message: format!("forced failure for .{}", self.fail_ext),
        }
    }
}

#[async_trait]
impl Transcoder for FailingTranscoder {
    async fn convert(
        &self,
        source: &Path,
        dest: &Path,
        sample_rate: u32,
        bit_depth: u32,
        channels: u32,
    ) -> Result<()> {
        if self.should_fail(dest) {
            return Err(self.failure());
        }
        CopyTranscoder
            .convert(source, dest, sample_rate, bit_depth, channels)
            .await
    }

    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        start: f32,
        end: f32,
        fade_secs: f32,
        norm_db: f32,
    ) -> Result<()> {
        if self.should_fail(dest) {
            return Err(self.failure());
        }
        CopyTranscoder
            .trim(source, dest, start, end, fade_secs, norm_db)
            .await
    }
}

/// Waveform renderer that writes small placeholder artifacts.
pub struct StubWaveformRenderer;

#[async_trait]
impl WaveformRenderer for StubWaveformRenderer {
    async fn render_image(
        &self,
        _source: &Path,
        dest: &Path,
        width: u32,
        height: u32,
    ) -> Result<()> {
        fs::write(dest, format!("image {}x{}", width, height)).await?;
        Ok(())
    }

    async fn render_peaks(&self, _source: &Path, dest: &Path, zoom: u32, bits: u32) -> Result<()> {
        fs::write(dest, format!("peaks z{} b{}", zoom, bits)).await?;
        Ok(())
    }
}

/// Tag writer that records the stamp in a `<file>.tag` sidecar instead of
/// touching the audio bytes.
pub struct SidecarTagWriter;

impl TagWriter for SidecarTagWriter {
    fn stamp(&self, path: &Path, tags: &TrackTags, cover: Option<&[u8]>) -> Result<()> {
        let sidecar = format!("{}.tag", path.display());
        let body = format!(
            "{} / {} / {} / {} / cover={}",
            tags.artist,
            tags.title,
            tags.year,
            tags.album,
            cover.map(|c| c.len()).unwrap_or(0)
        );
        std::fs::write(sidecar, body)?;
        Ok(())
    }
}
