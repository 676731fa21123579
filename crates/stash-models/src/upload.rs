//! Validation of uploaded originals.

use thiserror::Error;

/// Content types accepted for video uploads.
pub const ALLOWED_VIDEO_CONTENT_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/mpeg",
    "video/webm",
    "video/x-m4v",
    "video/x-matroska",
];

/// Maximum accepted upload size (500 MiB).
pub const MAX_VIDEO_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Upload rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("unsupported content type {0}: must be MP4, MOV, AVI, MPEG, WebM, M4V or MKV")]
    UnsupportedContentType(String),

    #[error("upload is {0} bytes, limit is 500 MiB")]
    TooLarge(u64),
}

/// Check an original upload before a record is created for it.
pub fn validate_original_upload(content_type: &str, byte_size: u64) -> Result<(), UploadError> {
    if !ALLOWED_VIDEO_CONTENT_TYPES.contains(&content_type) {
        return Err(UploadError::UnsupportedContentType(content_type.to_string()));
    }
    if byte_size > MAX_VIDEO_UPLOAD_BYTES {
        return Err(UploadError::TooLarge(byte_size));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_types() {
        assert!(validate_original_upload("video/quicktime", 10).is_ok());
        assert!(validate_original_upload("video/x-matroska", MAX_VIDEO_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert_eq!(
            validate_original_upload("image/png", 10),
            Err(UploadError::UnsupportedContentType("image/png".into()))
        );
    }

    #[test]
    fn test_rejects_oversized() {
        let size = MAX_VIDEO_UPLOAD_BYTES + 1;
        assert_eq!(
            validate_original_upload("video/mp4", size),
            Err(UploadError::TooLarge(size))
        );
    }
}
