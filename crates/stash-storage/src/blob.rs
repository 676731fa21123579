//! Blob storage capability used by the video pipeline.

use async_trait::async_trait;
use std::path::Path;

use crate::error::StorageResult;

/// Keyed object storage for video attachments.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the whole object at `key`.
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Store the file at `path` under `key`; returns the uploaded byte count.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<u64>;

    /// Remove the object at `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
