//! Seams to the external audio tooling.
//!
//! The core never touches codec internals itself: transcoding and trimming
//! go through [`Transcoder`], waveform artifacts through
//! [`WaveformRenderer`], and metadata stamping through [`TagWriter`]. The
//! production implementations shell out to sox/audiowaveform and write ID3
//! tags in-process; tests substitute mocks.

mod tags;
mod transcoder;
mod waveform;

pub use tags::{Id3TagWriter, TagWriter, TrackTags};
pub use transcoder::{SoxTranscoder, Transcoder};
pub use waveform::{AudiowaveformRenderer, WaveformRenderer};

use crate::error::ServerError;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on any single tool invocation; a wedged sox/audiowaveform
/// must not pin its worker forever.
const TOOL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Run an external tool to completion, mapping spawn failures, timeouts,
/// and non-zero exits onto [`ServerError::Subprocess`] with the captured
/// stderr.
pub(crate) async fn run_tool(tool: &str, command: &mut Command) -> Result<Output, ServerError> {
    command.kill_on_drop(true);

    let output = tokio::time::timeout(TOOL_TIMEOUT, command.output())
        .await
        .map_err(|_| ServerError::Subprocess {
            tool: tool.to_string(),
            message: format!("timed out after {}s", TOOL_TIMEOUT.as_secs()),
        })?
        .map_err(|e| ServerError::Subprocess {
            tool: tool.to_string(),
            message: format!("failed to start: {}", e),
        })?;

    if !output.status.success() {
        return Err(ServerError::Subprocess {
            tool: tool.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
