//! Shared data models for the Stash media backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video records and their processing status
//! - Attachments (original, poster, transcoded) and upload validation
//! - Encoding configuration for web playback
//! - Job identifiers

pub mod attachment;
pub mod encoding;
pub mod job;
pub mod upload;
pub mod video;

// Re-export common types
pub use attachment::{attachment_key, AttachmentKind, AttachmentRef};
pub use encoding::EncodingConfig;
pub use job::JobId;
pub use upload::{validate_original_upload, UploadError};
pub use video::{
    RecordError, ShortCode, ShortCodeError, VideoId, VideoMetadata, VideoRecord, VideoStatus,
};
