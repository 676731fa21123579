//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Record {0} has no original attachment")]
    MissingOriginal(String),

    #[error("Job timed out after {0}s")]
    Timeout(u64),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] stash_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] stash_firestore::FirestoreError),

    #[error("Media error: {0}")]
    Media(#[from] stash_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] stash_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Storage(e) => !matches!(
                e,
                stash_storage::StorageError::NotFound(_) | stash_storage::StorageError::ConfigError(_)
            ),
            WorkerError::Firestore(e) => e.is_retryable(),
            WorkerError::Queue(_) | WorkerError::Io(_) | WorkerError::Timeout(_) => true,
            _ => false,
        }
    }

    /// The record was deleted while the job was running.
    pub fn is_record_gone(&self) -> bool {
        matches!(
            self,
            WorkerError::Firestore(stash_firestore::FirestoreError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_firestore::FirestoreError;
    use stash_storage::StorageError;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::Timeout(60).is_retryable());
        assert!(WorkerError::from(FirestoreError::ServerError(503, "x".into())).is_retryable());
        assert!(WorkerError::from(StorageError::download_failed("reset")).is_retryable());

        assert!(!WorkerError::from(StorageError::not_found("k")).is_retryable());
        assert!(!WorkerError::MissingOriginal("v".into()).is_retryable());
        assert!(!WorkerError::from(stash_media::MediaError::FfmpegNotFound).is_retryable());
    }

    #[test]
    fn test_record_gone() {
        assert!(WorkerError::from(FirestoreError::not_found("videos/v")).is_record_gone());
        assert!(!WorkerError::Timeout(1).is_record_gone());
    }
}
