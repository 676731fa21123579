//! Video record persistence.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stash_models::{
    AttachmentKind, AttachmentRef, ShortCode, VideoId, VideoMetadata, VideoRecord, VideoStatus,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_status_conflict;
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};

/// Collection holding one document per video, keyed by video id.
pub const VIDEOS_COLLECTION: &str = "videos";

/// Attempts for a guarded status write when unrelated fields keep changing.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;

/// The video record store as seen by the processing pipeline.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Load a record; `None` if it was deleted.
    async fn get(&self, id: &VideoId) -> FirestoreResult<Option<VideoRecord>>;

    /// Persist probed duration, dimensions and size.
    async fn update_metadata(&self, id: &VideoId, metadata: &VideoMetadata) -> FirestoreResult<()>;

    /// Fill one attachment slot.
    async fn attach(
        &self,
        id: &VideoId,
        kind: AttachmentKind,
        attachment: &AttachmentRef,
    ) -> FirestoreResult<()>;

    /// Move the record from `from` to `to` if it is still in `from`.
    ///
    /// Returns `false` when the record is gone or no longer in `from`.
    async fn transition_status(
        &self,
        id: &VideoId,
        from: VideoStatus,
        to: VideoStatus,
    ) -> FirestoreResult<bool>;
}

/// [`VideoStore`] on the Firestore `videos` collection.
#[derive(Clone)]
pub struct FirestoreVideoRepository {
    client: FirestoreClient,
}

impl FirestoreVideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Insert a new record.
    pub async fn create(&self, record: &VideoRecord) -> FirestoreResult<()> {
        self.client
            .create_document(
                VIDEOS_COLLECTION,
                record.video_id.as_str(),
                video_to_fields(record),
            )
            .await?;
        info!(video_id = %record.video_id, "Created video record");
        Ok(())
    }

    /// Remove a record. Missing records are ignored.
    pub async fn delete(&self, id: &VideoId) -> FirestoreResult<()> {
        self.client
            .delete_document(VIDEOS_COLLECTION, id.as_str())
            .await
    }
}

#[async_trait]
impl VideoStore for FirestoreVideoRepository {
    async fn get(&self, id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        match self.client.get_document(VIDEOS_COLLECTION, id.as_str()).await? {
            Some(doc) => document_to_video(&doc, id).map(Some),
            None => Ok(None),
        }
    }

    async fn update_metadata(&self, id: &VideoId, metadata: &VideoMetadata) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "duration_seconds".to_string(),
            metadata.duration_seconds.to_firestore_value(),
        );
        fields.insert("width".to_string(), metadata.width.to_firestore_value());
        fields.insert("height".to_string(), metadata.height.to_firestore_value());
        fields.insert(
            "file_size_bytes".to_string(),
            metadata.file_size_bytes.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                VIDEOS_COLLECTION,
                id.as_str(),
                fields,
                Some(&[
                    "duration_seconds",
                    "width",
                    "height",
                    "file_size_bytes",
                    "updated_at",
                ]),
            )
            .await?;
        Ok(())
    }

    async fn attach(
        &self,
        id: &VideoId,
        kind: AttachmentKind,
        attachment: &AttachmentRef,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(kind.as_str().to_string(), attachment_to_value(attachment));
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                VIDEOS_COLLECTION,
                id.as_str(),
                fields,
                Some(&[kind.as_str(), "updated_at"]),
            )
            .await?;
        debug!(video_id = %id, kind = %kind, key = %attachment.key, "Attached blob");
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &VideoId,
        from: VideoStatus,
        to: VideoStatus,
    ) -> FirestoreResult<bool> {
        if !from.can_transition_to(to) {
            return Err(FirestoreError::PreconditionFailed(format!(
                "illegal status transition {} -> {}",
                from, to
            )));
        }

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let Some(doc) = self.client.get_document(VIDEOS_COLLECTION, id.as_str()).await? else {
                debug!(video_id = %id, "Record deleted before status write");
                return Ok(false);
            };

            let current = doc
                .get::<String>("status")
                .and_then(|s| VideoStatus::from_str(&s).ok());
            if current != Some(from) {
                debug!(video_id = %id, ?current, expected = %from, "Status already moved on");
                record_status_conflict(to.as_str());
                return Ok(false);
            }

            let update_time = doc.update_time.as_deref().ok_or_else(|| {
                FirestoreError::invalid_response("document has no updateTime")
            })?;

            let mut fields = HashMap::new();
            fields.insert("status".to_string(), to.as_str().to_firestore_value());
            fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

            match self
                .client
                .update_document_with_precondition(
                    VIDEOS_COLLECTION,
                    id.as_str(),
                    fields,
                    Some(&["status", "updated_at"]),
                    update_time,
                )
                .await
            {
                Ok(_) => {
                    info!(video_id = %id, from = %from, to = %to, "Video status changed");
                    return Ok(true);
                }
                Err(e) if e.is_precondition_failed() => {
                    debug!(video_id = %id, attempt, "Concurrent write during status change, re-reading");
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                Err(FirestoreError::NotFound(_)) => return Ok(false),
                Err(e) => return Err(e),
            }
        }

        warn!(video_id = %id, to = %to, "Gave up on status change after repeated concurrent writes");
        record_status_conflict(to.as_str());
        Ok(false)
    }
}

fn attachment_to_value(attachment: &AttachmentRef) -> Value {
    let mut fields = HashMap::new();
    fields.insert("key".to_string(), attachment.key.to_firestore_value());
    fields.insert("filename".to_string(), attachment.filename.to_firestore_value());
    fields.insert(
        "content_type".to_string(),
        attachment.content_type.to_firestore_value(),
    );
    fields.insert("byte_size".to_string(), attachment.byte_size.to_firestore_value());
    Value::map(fields)
}

fn value_to_attachment(value: &Value) -> Option<AttachmentRef> {
    let fields = value.as_map()?;
    let string = |key: &str| fields.get(key).and_then(String::from_firestore_value);

    Some(AttachmentRef {
        key: string("key")?,
        filename: string("filename").unwrap_or_default(),
        content_type: string("content_type").unwrap_or_default(),
        byte_size: fields
            .get("byte_size")
            .and_then(u64::from_firestore_value)
            .unwrap_or(0),
    })
}

fn video_to_fields(record: &VideoRecord) -> HashMap<String, Value> {
    let attachment = |a: &Option<AttachmentRef>| {
        a.as_ref()
            .map(attachment_to_value)
            .unwrap_or(Value::NullValue(()))
    };

    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), record.user_id.to_firestore_value());
    fields.insert("album_id".to_string(), record.album_id.to_firestore_value());
    fields.insert("title".to_string(), record.title.to_firestore_value());
    fields.insert("description".to_string(), record.description.to_firestore_value());
    fields.insert("short_code".to_string(), record.short_code.as_str().to_firestore_value());
    fields.insert("is_public".to_string(), record.is_public.to_firestore_value());
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert("duration_seconds".to_string(), record.duration_seconds.to_firestore_value());
    fields.insert("width".to_string(), record.width.to_firestore_value());
    fields.insert("height".to_string(), record.height.to_firestore_value());
    fields.insert("file_size_bytes".to_string(), record.file_size_bytes.to_firestore_value());
    fields.insert("original".to_string(), attachment(&record.original));
    fields.insert("poster".to_string(), attachment(&record.poster));
    fields.insert("transcoded".to_string(), attachment(&record.transcoded));
    fields.insert("created_at".to_string(), record.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), record.updated_at.to_firestore_value());
    fields
}

fn document_to_video(doc: &Document, id: &VideoId) -> FirestoreResult<VideoRecord> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_response("Document has no fields"))?;

    let short_code = doc
        .get::<String>("short_code")
        .ok_or_else(|| FirestoreError::invalid_response(format!("video {} has no short_code", id)))
        .and_then(|s| {
            ShortCode::parse(&s).map_err(|e| {
                FirestoreError::invalid_response(format!("video {}: {}", id, e))
            })
        })?;

    let status = match doc.get::<String>("status") {
        Some(s) => VideoStatus::from_str(&s).map_err(FirestoreError::invalid_response)?,
        None => VideoStatus::default(),
    };

    let attachment = |key: &str| fields.get(key).and_then(value_to_attachment);
    let timestamp = |key: &str| {
        doc.get::<DateTime<Utc>>(key)
            .or_else(|| {
                doc.create_time
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(Into::into)
            })
            .unwrap_or_else(Utc::now)
    };

    Ok(VideoRecord {
        video_id: id.clone(),
        user_id: doc.get("user_id").unwrap_or_default(),
        album_id: doc.get("album_id"),
        title: doc.get("title").unwrap_or_default(),
        description: doc.get("description"),
        short_code,
        is_public: doc.get("is_public").unwrap_or(false),
        status,
        duration_seconds: doc.get("duration_seconds"),
        width: doc.get("width"),
        height: doc.get("height"),
        file_size_bytes: doc.get("file_size_bytes"),
        original: attachment("original"),
        poster: attachment("poster"),
        transcoded: attachment("transcoded"),
        created_at: timestamp("created_at"),
        updated_at: timestamp("updated_at"),
    })
}
