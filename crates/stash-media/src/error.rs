//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("FFmpeg reported success but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when ffprobe ran but could not make sense of the file, as
    /// opposed to the tooling or filesystem failing. A file that parses but
    /// has no usable video stream is reported through `ProbeResult::valid`.
    pub fn is_unreadable_media(&self) -> bool {
        matches!(
            self,
            MediaError::FfprobeFailed { .. } | MediaError::JsonParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_media_classification() {
        assert!(MediaError::FfprobeFailed {
            message: "exit 1".into(),
            stderr: None
        }
        .is_unreadable_media());

        assert!(!MediaError::FfprobeNotFound.is_unreadable_media());
        assert!(!MediaError::Io(std::io::Error::other("disk")).is_unreadable_media());
        assert!(!MediaError::Timeout(30).is_unreadable_media());
    }
}
