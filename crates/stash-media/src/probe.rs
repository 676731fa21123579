//! FFprobe media inspection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Structural metadata of one source file.
///
/// `valid` only says a decodable video stream with real dimensions was
/// found. It does not promise that encoding will succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// First video stream codec as ffprobe names it (e.g. "h264", "vp9")
    pub video_codec: Option<String>,
    /// First audio stream codec; `None` for silent video
    pub audio_codec: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Seconds, fractional
    pub duration: f64,
    /// Lowercase file extension without the dot (e.g. "mp4", "mov")
    pub container: String,
    pub byte_size: u64,
    pub valid: bool,
}

impl ProbeResult {
    /// Duration truncated to whole seconds, as persisted on the record.
    pub fn duration_secs(&self) -> u32 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.duration.trunc().min(u32::MAX as f64) as u32
        } else {
            0
        }
    }
}

/// Capability to inspect a local media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeResult>;
}

/// [`MediaProber`] backed by the `ffprobe` binary.
#[derive(Debug, Clone, Default)]
pub struct Ffprobe;

#[async_trait]
impl MediaProber for Ffprobe {
    async fn probe(&self, path: &Path) -> MediaResult<ProbeResult> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        check_ffprobe()?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: format!("FFprobe exited with {}", output.status),
                stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            });
        }

        let mut result = parse_ffprobe_output(&output.stdout, path)?;

        // Some containers omit format.size
        if result.byte_size == 0 {
            result.byte_size = tokio::fs::metadata(path).await?.len();
        }

        debug!(
            path = %path.display(),
            video_codec = ?result.video_codec,
            audio_codec = ?result.audio_codec,
            width = result.width,
            height = result.height,
            duration = result.duration,
            valid = result.valid,
            "Probed media file"
        );

        Ok(result)
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
///
/// The container is taken from `path`'s extension. Malformed JSON is an
/// error; a well-formed document without a usable video stream yields
/// `valid == false`.
pub fn parse_ffprobe_output(json: &[u8], path: &Path) -> MediaResult<ProbeResult> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream_of = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };
    let video = stream_of("video");
    let audio = stream_of("audio");

    let format = probe.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .or_else(|| video.and_then(|s| s.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);
    let byte_size = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let width = video.and_then(|s| s.width).unwrap_or(0);
    let height = video.and_then(|s| s.height).unwrap_or(0);

    Ok(ProbeResult {
        video_codec: video.and_then(|s| s.codec_name.clone()),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        width,
        height,
        duration,
        container: container_of(path),
        byte_size,
        valid: video.is_some() && width > 0 && height > 0,
    })
}

fn container_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}
