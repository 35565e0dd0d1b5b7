//! Video dimension probing via `ffprobe`.
//!
//! The prober runs
//! `<program> -v error -print_format json -show_streams <path>` and reads the
//! width and height of the first stream that has both.  Audio and data
//! streams report no dimensions and are skipped.

use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Pixel dimensions of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Reasons a probe produced no usable dimensions.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe did not finish within {0:?}")]
    Timeout(Duration),

    #[error("probe exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("probe output is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no streams found in media file")]
    NoStreams,

    #[error("no stream with positive width and height")]
    NoVideoStream,
}

/// Reports the pixel dimensions of a local media file.
pub trait MediaProber: Send + Sync + 'static {
    fn probe<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Dimensions, ProbeError>> + Send + 'a>>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Parse the JSON document printed by `ffprobe -show_streams`.
fn parse_output(stdout: &[u8]) -> Result<Dimensions, ProbeError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;
    if output.streams.is_empty() {
        return Err(ProbeError::NoStreams);
    }
    output
        .streams
        .iter()
        .find_map(|s| match (s.width, s.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(Dimensions { width, height })
            }
            _ => None,
        })
        .ok_or(ProbeError::NoVideoStream)
}

/// Production prober backed by an `ffprobe` executable.
pub struct FfprobeProber {
    program: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl MediaProber for FfprobeProber {
    fn probe<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Dimensions, ProbeError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(program = %self.program.display(), path = %path.display(), "probing media");

            let child = Command::new(&self.program)
                .args(["-v", "error", "-print_format", "json", "-show_streams"])
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| ProbeError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                })?;

            // Dropping the child on timeout kills it.
            let output = tokio::time::timeout(self.timeout, child.wait_with_output())
                .await
                .map_err(|_| ProbeError::Timeout(self.timeout))?
                .map_err(|source| ProbeError::Spawn {
                    program: self.program.display().to_string(),
                    source,
                })?;

            if !output.status.success() {
                return Err(ProbeError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            parse_output(&output.stdout)
        })
    }
}
