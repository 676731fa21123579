//! Web playback encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Container every web-ready output uses.
pub const TARGET_CONTAINER: &str = "mp4";
/// Video codec for full transcodes (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Audio codec for full transcodes
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Constant Rate Factor for full transcodes
pub const DEFAULT_CRF: u8 = 28;
/// Pixel format understood by every browser decoder
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Widest frame served without re-encoding.
pub const MAX_WEB_WIDTH: u32 = 1920;

/// Video codec names (as reported by ffprobe) that browsers play natively.
pub const WEB_VIDEO_CODECS: &[&str] = &["h264", "avc1"];
/// Audio codec names that browsers play natively.
pub const WEB_AUDIO_CODECS: &[&str] = &["aac"];

/// Poster generation settings
pub const POSTER_MAX_WIDTH: u32 = 1280;
pub const POSTER_MAX_SEEK_SECS: f64 = 1.0;
pub const POSTER_SEEK_FRACTION: f64 = 0.1;

/// Video encoding configuration for full transcodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Relocate the moov atom so playback can start before download finishes
    #[serde(default = "default_faststart")]
    pub faststart: bool,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_faststart() -> bool {
    true
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            faststart: true,
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Convert to FFmpeg output arguments (scaling is added separately).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ];

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args
    }
}
