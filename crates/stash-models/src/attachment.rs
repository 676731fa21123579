//! Attachment references and naming.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::video::{ShortCode, VideoId};

/// Content type for poster frames.
pub const POSTER_CONTENT_TYPE: &str = "image/jpeg";
/// Content type for transcoded output.
pub const TRANSCODED_CONTENT_TYPE: &str = "video/mp4";

/// Attachment slots on a video record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Original,
    Poster,
    Transcoded,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Original => "original",
            AttachmentKind::Poster => "poster",
            AttachmentKind::Transcoded => "transcoded",
        }
    }

    /// Filename the pipeline gives a generated attachment.
    ///
    /// Returns `None` for the original, which keeps its uploaded name.
    pub fn generated_filename(&self, short_code: &ShortCode) -> Option<String> {
        match self {
            AttachmentKind::Original => None,
            AttachmentKind::Poster => Some(format!("{}_poster.jpg", short_code)),
            AttachmentKind::Transcoded => Some(format!("{}.mp4", short_code)),
        }
    }

    /// Content type of a generated attachment.
    pub fn generated_content_type(&self) -> Option<&'static str> {
        match self {
            AttachmentKind::Original => None,
            AttachmentKind::Poster => Some(POSTER_CONTENT_TYPE),
            AttachmentKind::Transcoded => Some(TRANSCODED_CONTENT_TYPE),
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pointer to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentRef {
    /// Object key in blob storage
    pub key: String,
    pub filename: String,
    pub content_type: String,
    pub byte_size: u64,
}

impl AttachmentRef {
    pub fn new(
        key: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        byte_size: u64,
    ) -> Self {
        Self {
            key: key.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            byte_size,
        }
    }

    /// Lowercased extension of the filename including the dot, e.g. `.mov`.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.filename.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// Blob key for an attachment: `videos/<video_id>/<kind>/<filename>`.
pub fn attachment_key(video_id: &VideoId, kind: AttachmentKind, filename: &str) -> String {
    format!("videos/{}/{}/{}", video_id, kind, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_filenames() {
        let code = ShortCode::parse("Ab12Cd").unwrap();
        assert_eq!(
            AttachmentKind::Poster.generated_filename(&code).as_deref(),
            Some("Ab12Cd_poster.jpg")
        );
        assert_eq!(
            AttachmentKind::Transcoded.generated_filename(&code).as_deref(),
            Some("Ab12Cd.mp4")
        );
        assert_eq!(AttachmentKind::Original.generated_filename(&code), None);
    }

    #[test]
    fn test_extension() {
        let a = AttachmentRef::new("k", "Clip.MOV", "video/quicktime", 1);
        assert_eq!(a.extension().as_deref(), Some(".mov"));

        let none = AttachmentRef::new("k", "noext", "video/mp4", 1);
        assert_eq!(none.extension(), None);

        let hidden = AttachmentRef::new("k", ".mp4", "video/mp4", 1);
        assert_eq!(hidden.extension(), None);
    }

    #[test]
    fn test_attachment_key() {
        let id = VideoId::from("v-1");
        assert_eq!(
            attachment_key(&id, AttachmentKind::Poster, "x_poster.jpg"),
            "videos/v-1/poster/x_poster.jpg"
        );
    }
}
