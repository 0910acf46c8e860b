use super::{path_arg, run_tool};
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Produces waveform artifacts from a sealed master: overview/full PNG
/// images and the binary peaks file the frontend seeks through.
#[async_trait]
pub trait WaveformRenderer: Send + Sync {
    async fn render_image(&self, source: &Path, dest: &Path, width: u32, height: u32)
        -> Result<()>;

    async fn render_peaks(&self, source: &Path, dest: &Path, zoom: u32, bits: u32) -> Result<()>;
}

/// Production renderer shelling out to audiowaveform.
pub struct AudiowaveformRenderer {
    bin: PathBuf,
}

impl AudiowaveformRenderer {
    pub fn new() -> Self {
        Self {
            bin: PathBuf::from("audiowaveform"),
        }
    }

    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for AudiowaveformRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WaveformRenderer for AudiowaveformRenderer {
    async fn render_image(
        &self,
        source: &Path,
        dest: &Path,
        width: u32,
        height: u32,
    ) -> Result<()> {
        debug!(
            "Rendering waveform image {} ({}x{})",
            dest.display(),
            width,
            height
        );

        let mut cmd = Command::new(&self.bin);
        cmd.args([
            "--input-filename",
            &path_arg(source),
            "--output-filename",
            &path_arg(dest),
            "--zoom",
            "auto",
            "--width",
            &width.to_string(),
            "--height",
            &height.to_string(),
        ]);

        run_tool("audiowaveform", &mut cmd).await?;
        Ok(())
    }

    async fn render_peaks(&self, source: &Path, dest: &Path, zoom: u32, bits: u32) -> Result<()> {
        debug!("Rendering waveform peaks {}", dest.display());

        let mut cmd = Command::new(&self.bin);
        cmd.args([
            "--input-filename",
            &path_arg(source),
            "--output-filename",
            &path_arg(dest),
            "-z",
            &zoom.to_string(),
            "-b",
            &bits.to_string(),
        ]);

        run_tool("audiowaveform", &mut cmd).await?;
        Ok(())
    }
}
