//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stash_models::{JobId, VideoId};

/// Run the ingestion pipeline for one freshly uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("process_video:{}", self.video_id)
    }
}

/// Envelope stored in the stream, tagged by job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    ProcessVideo(ProcessVideoJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ProcessVideo(j) => &j.job_id,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        match self {
            QueueJob::ProcessVideo(j) => &j.video_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessVideo(j) => j.idempotency_key(),
        }
    }

    /// Short type label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueueJob::ProcessVideo(_) => "process_video",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_tagged() {
        let job = QueueJob::ProcessVideo(ProcessVideoJob::new(VideoId::from_string("vid-1")));
        let json: serde_json::Value = serde_json::to_value(&job).unwrap();

        assert_eq!(json["type"], "process_video");
        assert_eq!(json["video_id"], "vid-1");
        assert!(json["job_id"].is_string());

        let decoded: QueueJob = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_idempotency_key_ignores_job_id() {
        let a = ProcessVideoJob::new(VideoId::from_string("vid-1"));
        let b = ProcessVideoJob::new(VideoId::from_string("vid-1"));
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.idempotency_key(), "process_video:vid-1");
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type": "render_clip", "job_id": "x", "video_id": "y", "created_at": "2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<QueueJob>(json).is_err());
    }
}
