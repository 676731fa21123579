//! Per-video processing pipeline.
//!
//! One run takes a freshly uploaded video from `processing` to `ready` or
//! `failed`:
//!
//! 1. load the record (gone → no-op, not `processing` → no-op)
//! 2. download the original into a private scratch directory
//! 3. probe it (unreadable → `failed`, no error raised)
//! 4. persist duration, dimensions and size
//! 5. extract and attach a poster (extraction failure tolerated)
//! 6. skip, remux or transcode and attach the result (encoder failure
//!    tolerated)
//! 7. mark the record `ready`
//!
//! Any other error in steps 2-7, including the job timeout, marks the
//! record `failed` and is returned to the caller. The scratch directory is
//! removed on every path because it is dropped with the run's future.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use stash_firestore::VideoStore;
use stash_media::{
    decide, extract_poster, run_transcode, Encoder, MediaProber, ScratchSpace, TranscodeOutcome,
};
use stash_models::{
    attachment_key, AttachmentKind, AttachmentRef, EncodingConfig, VideoId, VideoMetadata,
    VideoRecord, VideoStatus,
};
use stash_storage::BlobStore;
use tracing::{error, info, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(3600);

/// How the transcode step ended for a video that reached `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeReport {
    /// Source was already web-ready; nothing attached.
    Skipped,
    /// Stream-copied mp4 attached.
    Remuxed,
    /// Re-encoded mp4 attached.
    Transcoded,
    /// Re-encode came out larger than the source and was dropped.
    DiscardedLarger,
    /// Encoder failed; the original stays the playback source.
    Failed,
}

impl TranscodeReport {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeReport::Skipped => "skipped",
            TranscodeReport::Remuxed => "remuxed",
            TranscodeReport::Transcoded => "transcoded",
            TranscodeReport::DiscardedLarger => "discarded_larger",
            TranscodeReport::Failed => "failed",
        }
    }

    /// Whether a transcoded attachment was written.
    pub fn attached(&self) -> bool {
        matches!(self, TranscodeReport::Remuxed | TranscodeReport::Transcoded)
    }
}

impl From<&TranscodeOutcome> for TranscodeReport {
    fn from(outcome: &TranscodeOutcome) -> Self {
        match outcome {
            TranscodeOutcome::Skipped => TranscodeReport::Skipped,
            TranscodeOutcome::Remuxed(_) => TranscodeReport::Remuxed,
            TranscodeOutcome::Transcoded(_) => TranscodeReport::Transcoded,
            TranscodeOutcome::DiscardedLarger { .. } => TranscodeReport::DiscardedLarger,
        }
    }
}

/// Result of a pipeline run that did not raise an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The record was deleted before or during the run.
    RecordMissing,
    /// The record was not `processing` when loaded; left untouched.
    AlreadyFinished(VideoStatus),
    /// The record left `processing` while this run was working on it.
    Superseded,
    /// The original is not a readable video; record marked `failed`.
    Rejected,
    /// Record marked `ready`.
    Ready {
        poster_attached: bool,
        transcode: TranscodeReport,
    },
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::RecordMissing => "record_missing",
            PipelineOutcome::AlreadyFinished(_) => "already_finished",
            PipelineOutcome::Superseded => "superseded",
            PipelineOutcome::Rejected => "rejected",
            PipelineOutcome::Ready { .. } => "ready",
        }
    }
}

/// Drives one video record through probing, poster and transcode.
pub struct VideoPipeline {
    store: Arc<dyn VideoStore>,
    blobs: Arc<dyn BlobStore>,
    prober: Arc<dyn MediaProber>,
    encoder: Arc<dyn Encoder>,
    encoding: EncodingConfig,
    work_dir: PathBuf,
    job_timeout: Duration,
}

impl VideoPipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        blobs: Arc<dyn BlobStore>,
        prober: Arc<dyn MediaProber>,
        encoder: Arc<dyn Encoder>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            blobs,
            prober,
            encoder,
            encoding: EncodingConfig::default(),
            work_dir: work_dir.into(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }

    /// Hard limit for steps 2-7 of one run.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Process one video record.
    pub async fn process(&self, video_id: &VideoId) -> WorkerResult<PipelineOutcome> {
        self.process_with_logger(video_id, &JobLogger::for_video(video_id))
            .await
    }

    /// Process one video record, logging under the given job.
    pub async fn process_with_logger(
        &self,
        video_id: &VideoId,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutcome> {
        let started = Instant::now();
        let result = self
            .run(video_id, logger)
            .instrument(logger.create_span())
            .await;

        let label = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "failed",
        };
        metrics::record_job(label, started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, video_id: &VideoId, logger: &JobLogger) -> WorkerResult<PipelineOutcome> {
        let Some(record) = self.store.get(video_id).await? else {
            info!(video_id = %video_id, "Video record no longer exists, skipping");
            return Ok(PipelineOutcome::RecordMissing);
        };

        if record.status != VideoStatus::Processing {
            info!(
                video_id = %video_id,
                status = %record.status,
                "Video already finished, skipping"
            );
            return Ok(PipelineOutcome::AlreadyFinished(record.status));
        }

        logger.log_start(&format!("processing '{}'", record.title));

        let result = tokio::time::timeout(self.job_timeout, self.run_stages(&record, logger))
            .await
            .unwrap_or_else(|_| Err(WorkerError::Timeout(self.job_timeout.as_secs())));

        match result {
            Ok(outcome) => {
                logger.log_completion(outcome.as_str());
                Ok(outcome)
            }
            Err(e) if e.is_record_gone() => {
                info!(video_id = %video_id, "Video record deleted during processing");
                Ok(PipelineOutcome::RecordMissing)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                self.mark_failed(video_id).await;
                Err(e)
            }
        }
    }

    /// Steps 2-7. The scratch directory lives exactly as long as this future.
    async fn run_stages(
        &self,
        record: &VideoRecord,
        logger: &JobLogger,
    ) -> WorkerResult<PipelineOutcome> {
        let video_id = &record.video_id;
        let original = record
            .original
            .as_ref()
            .ok_or_else(|| WorkerError::MissingOriginal(video_id.to_string()))?;

        let scratch = ScratchSpace::create_in(&self.work_dir, "video").await?;
        let source = scratch.file(&format!(
            "original{}",
            original.extension().unwrap_or_default()
        ));

        let bytes = self.blobs.download(&original.key).await?;
        tokio::fs::write(&source, &bytes).await?;
        logger.log_progress("download", &format!("{} bytes", bytes.len()));
        drop(bytes);

        let probe = match self.prober.probe(&source).await {
            Ok(probe) if probe.valid => probe,
            Ok(_) => return self.reject(video_id, logger, "no decodable video stream").await,
            Err(e) if e.is_unreadable_media() => {
                return self.reject(video_id, logger, &e.to_string()).await
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = VideoMetadata {
            duration_seconds: probe.duration_secs(),
            width: probe.width,
            height: probe.height,
            file_size_bytes: probe.byte_size,
        };
        self.store.update_metadata(video_id, &metadata).await?;
        logger.log_progress(
            "probe",
            &format!(
                "{}x{} {}s {}",
                probe.width,
                probe.height,
                metadata.duration_seconds,
                probe.video_codec.as_deref().unwrap_or("unknown")
            ),
        );

        let poster_output = scratch.file("poster.jpg");
        let poster_attached =
            match extract_poster(self.encoder.as_ref(), &source, &probe, &poster_output).await {
                Ok(poster) => {
                    self.upload_and_attach(record, AttachmentKind::Poster, &poster)
                        .await?;
                    true
                }
                Err(e) => {
                    logger.log_warning("poster", &e.to_string());
                    metrics::record_degraded("poster");
                    false
                }
            };

        let decision = decide(&probe);
        metrics::record_decision(decision.as_str());
        logger.log_progress("transcode", decision.as_str());

        let transcode_output = scratch.file("transcoded.mp4");
        let transcode = match run_transcode(
            self.encoder.as_ref(),
            decision,
            &source,
            &probe,
            &transcode_output,
            &self.encoding,
        )
        .await
        {
            Ok(outcome) => {
                if let Some(path) = outcome.output() {
                    self.upload_and_attach(record, AttachmentKind::Transcoded, path)
                        .await?;
                }
                TranscodeReport::from(&outcome)
            }
            Err(e) => {
                logger.log_warning("transcode", &e.to_string());
                metrics::record_degraded("transcode");
                TranscodeReport::Failed
            }
        };

        if !self
            .store
            .transition_status(video_id, VideoStatus::Processing, VideoStatus::Ready)
            .await?
        {
            info!(video_id = %video_id, "Video left processing during the run, not marking ready");
            return Ok(PipelineOutcome::Superseded);
        }

        Ok(PipelineOutcome::Ready {
            poster_attached,
            transcode,
        })
    }

    async fn reject(
        &self,
        video_id: &VideoId,
        logger: &JobLogger,
        reason: &str,
    ) -> WorkerResult<PipelineOutcome> {
        logger.log_warning("probe", &format!("unreadable media: {}", reason));
        if !self
            .store
            .transition_status(video_id, VideoStatus::Processing, VideoStatus::Failed)
            .await?
        {
            info!(video_id = %video_id, "Video left processing before it could be rejected");
            return Ok(PipelineOutcome::Superseded);
        }
        Ok(PipelineOutcome::Rejected)
    }

    async fn upload_and_attach(
        &self,
        record: &VideoRecord,
        kind: AttachmentKind,
        path: &Path,
    ) -> WorkerResult<AttachmentRef> {
        let (Some(filename), Some(content_type)) = (
            kind.generated_filename(&record.short_code),
            kind.generated_content_type(),
        ) else {
            return Err(WorkerError::processing_failed(format!(
                "{} attachments are not generated",
                kind
            )));
        };

        let key = attachment_key(&record.video_id, kind, &filename);
        let byte_size = self.blobs.upload_file(path, &key, content_type).await?;
        let attachment = AttachmentRef::new(key, filename, content_type, byte_size);
        self.store
            .attach(&record.video_id, kind, &attachment)
            .await?;
        Ok(attachment)
    }

    async fn mark_failed(&self, video_id: &VideoId) {
        match self
            .store
            .transition_status(video_id, VideoStatus::Processing, VideoStatus::Failed)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(video_id = %video_id, "Video left processing before it could be marked failed")
            }
            Err(e) => error!(video_id = %video_id, error = %e, "Failed to mark video as failed"),
        }
    }
}
