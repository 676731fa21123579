//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for job processing with
//! tracing spans and contextual information.

use stash_models::{JobId, VideoId};
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job id and the video being processed.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and video.
    pub fn new(job_id: &JobId, video_id: &VideoId) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
        }
    }

    /// Logger for a pipeline run that was not started from a queued job.
    pub fn for_video(video_id: &VideoId) -> Self {
        Self {
            job_id: "-".to_string(),
            video_id: video_id.to_string(),
        }
    }

    /// Log the start of a job operation.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job started: {}", message
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage,
            "Job progress: {}", message
        );
    }

    /// Log a tolerated failure.
    pub fn log_warning(&self, stage: &str, message: &str) {
        warn!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage,
            "Job warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job error: {}", message
        );
    }

    /// Log the completion of a job operation.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            "Job completed: {}", message
        );
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the video ID.
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            video_id = %self.video_id
        )
    }
}
