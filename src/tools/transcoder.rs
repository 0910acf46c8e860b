use super::{path_arg, run_tool};
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Converts raw session audio into distributable formats and cuts trimmed,
/// faded, normalized segments out of a sealed master.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode a raw PCM stream into the format implied by `dest`'s extension.
    async fn convert(
        &self,
        source: &Path,
        dest: &Path,
        sample_rate: u32,
        bit_depth: u32,
        channels: u32,
    ) -> Result<()>;

    /// Cut `[start, end]` seconds out of `source`, applying a fade of
    /// `fade_secs` at both edges and peak normalization to `norm_db` dBFS.
    async fn trim(
        &self,
        source: &Path,
        dest: &Path,
        start: f32,
        end: f32,
        fade_secs: f32,
        norm_db: f32,
    ) -> Result<()>;
}

/// Production transcoder shelling out to sox.
pub struct SoxTranscoder {
    sox_bin: PathBuf,
}

impl SoxTranscoder {
    pub fn new() -> Self {
        Self {
            sox_bin: PathBuf::from("sox"),
        }
    }

    pub fn with_binary(sox_bin: impl Into<PathBuf>) -> Self {
        Self {
            sox_bin: sox_bin.into(),
        }
    }
}

impl Default for SoxTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for SoxTranscoder {
    async fn convert(
        &self,
        source: &Path,
        dest: &Path,
        sample_rate: u32,
        bit_depth: u32,
        channels: u32,
    ) -> Result<()> {
        debug!("Converting {} -> {}", source.display(), dest.display());

        let mut cmd = Command::new(&self.sox_bin);
        cmd.args([
            "-r",
            &sample_rate.to_string(),
            "-b",
            &bit_depth.to_string(),
            "-c",
            &channels.to_string(),
            "--endian=little",
            "--encoding=signed-integer",
            &path_arg(source),
            &path_arg(dest),
        ]);

        run_tool("sox", &mut cmd).await?;
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
        debug!(
            "Trimming {} [{}..{}] -> {}",
            source.display(),
            start,
            end,
            dest.display()
        );

        let fade = format!("{:.1}", fade_secs);

        let args: Vec<String> = vec![
            path_arg(source),
            path_arg(dest),
            "trim".to_string(),
            format!("{}", start),
            format!("={}", end),
            "fade".to_string(),
            fade.clone(),
            "-0".to_string(),
            fade,
            "norm".to_string(),
            format!("{}", norm_db),
        ];

        let mut cmd = Command::new(&self.sox_bin);
        cmd.args(args);

        run_tool("sox", &mut cmd).await?;
        Ok(())
    }
}
