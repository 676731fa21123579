//! Video record models.

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::attachment::{AttachmentKind, AttachmentRef};

/// Length of a public short code.
pub const SHORT_CODE_LEN: usize = 6;

/// Unique identifier for a video record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Errors from parsing a short code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortCodeError {
    #[error("short code must be 6 characters, got {0}")]
    InvalidLength(usize),

    #[error("short code contains non-alphanumeric character {0:?}")]
    InvalidCharacter(char),
}

/// Compact random token used in public share links.
///
/// Generated once when the record is created and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Generate a random short code.
    pub fn generate() -> Self {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_CODE_LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    /// Generate a short code that `exists` reports as unused.
    ///
    /// The caller owns the uniqueness check (usually an index lookup).
    pub fn generate_unique(mut exists: impl FnMut(&ShortCode) -> bool) -> Self {
        loop {
            let code = Self::generate();
            if !exists(&code) {
                return code;
            }
        }
    }

    /// Parse and validate an existing short code.
    pub fn parse(s: &str) -> Result<Self, ShortCodeError> {
        let len = s.chars().count();
        if len != SHORT_CODE_LEN {
            return Err(ShortCodeError::InvalidLength(len));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(ShortCodeError::InvalidCharacter(c));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ShortCode {
    type Err = ShortCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Video processing status.
///
/// `Processing` is the only non-terminal state. Only the processing
/// pipeline moves a record out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Upload accepted, pipeline has not finished
    #[default]
    Processing,
    /// Playable (transcoded output if present, otherwise the original)
    Ready,
    /// Processing failed; no playback guarantees
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Processing, VideoStatus::Ready)
                | (VideoStatus::Processing, VideoStatus::Failed)
        )
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "ready" => Ok(VideoStatus::Ready),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status: {}", other)),
        }
    }
}

/// Metadata persisted after a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Duration in whole seconds (truncated)
    pub duration_seconds: u32,
    pub width: u32,
    pub height: u32,
    /// Size of the original upload in bytes
    pub file_size_bytes: u64,
}

/// A user's uploaded video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: VideoId,

    /// Owner
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub short_code: ShortCode,

    /// Visibility, independent of processing status
    #[serde(default)]
    pub is_public: bool,

    #[serde(default)]
    pub status: VideoStatus,

    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,

    /// Uploaded source
    #[serde(default)]
    pub original: Option<AttachmentRef>,

    /// Still frame, present only if extraction succeeded
    #[serde(default)]
    pub poster: Option<AttachmentRef>,

    /// Web-ready video, present only if a remux or transcode produced output
    #[serde(default)]
    pub transcoded: Option<AttachmentRef>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validation failures for a [`VideoRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("original attachment is missing")]
    MissingOriginal,

    #[error("ready video is missing probed metadata")]
    ReadyWithoutMetadata,
}

impl VideoRecord {
    /// Create a freshly uploaded record in the `processing` state.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        short_code: ShortCode,
        original: AttachmentRef,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id: VideoId::new(),
            user_id: user_id.into(),
            album_id: None,
            title: title.into(),
            description: None,
            short_code,
            is_public: false,
            status: VideoStatus::Processing,
            duration_seconds: None,
            width: None,
            height: None,
            file_size_bytes: None,
            original: Some(original),
            poster: None,
            transcoded: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the album.
    pub fn with_album(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    /// Set visibility.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == VideoStatus::Ready
    }

    pub fn is_processing(&self) -> bool {
        self.status == VideoStatus::Processing
    }

    pub fn is_failed(&self) -> bool {
        self.status == VideoStatus::Failed
    }

    /// Probed metadata, if all fields are populated.
    pub fn metadata(&self) -> Option<VideoMetadata> {
        Some(VideoMetadata {
            duration_seconds: self.duration_seconds?,
            width: self.width?,
            height: self.height?,
            file_size_bytes: self.file_size_bytes?,
        })
    }

    /// Copy probed metadata onto the record.
    pub fn apply_metadata(&mut self, metadata: &VideoMetadata) {
        self.duration_seconds = Some(metadata.duration_seconds);
        self.width = Some(metadata.width);
        self.height = Some(metadata.height);
        self.file_size_bytes = Some(metadata.file_size_bytes);
    }

    /// Get an attachment slot.
    pub fn attachment(&self, kind: AttachmentKind) -> Option<&AttachmentRef> {
        match kind {
            AttachmentKind::Original => self.original.as_ref(),
            AttachmentKind::Poster => self.poster.as_ref(),
            AttachmentKind::Transcoded => self.transcoded.as_ref(),
        }
    }

    /// Replace an attachment slot.
    pub fn set_attachment(&mut self, kind: AttachmentKind, attachment: AttachmentRef) {
        match kind {
            AttachmentKind::Original => self.original = Some(attachment),
            AttachmentKind::Poster => self.poster = Some(attachment),
            AttachmentKind::Transcoded => self.transcoded = Some(attachment),
        }
    }

    /// The attachment a player should load: transcoded output, falling back to the original.
    pub fn playback_attachment(&self) -> Option<&AttachmentRef> {
        self.transcoded.as_ref().or(self.original.as_ref())
    }

    /// Duration formatted as `m:ss`.
    pub fn formatted_duration(&self) -> Option<String> {
        let secs = self.duration_seconds?;
        Some(format!("{}:{:02}", secs / 60, secs % 60))
    }

    /// Check record invariants.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.original.is_none() {
            return Err(RecordError::MissingOriginal);
        }
        if self.is_ready()
            && (self.duration_seconds.is_none() || self.width.is_none() || self.height.is_none())
        {
            return Err(RecordError::ReadyWithoutMetadata);
        }
        Ok(())
    }
}
