//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use stash_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::pipeline::VideoPipeline;

/// Block time for one XREADGROUP call.
const CONSUME_BLOCK_MS: u64 = 1000;
/// Upper bound on messages read or claimed per call.
const BATCH_SIZE: usize = 5;

/// What to do with a message whose job returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureAction {
    /// Leave it pending; the claim loop redelivers it once idle.
    Retry,
    DeadLetter,
}

/// A pipeline error after the record loads has already marked it `failed`, so a
/// retried delivery ends as `AlreadyFinished`; only pre-load faults get re-run.
fn failure_action(retryable: bool, retry_count: u32, max_retries: u32) -> FailureAction {
    if retryable && retry_count < max_retries {
        FailureAction::Retry
    } else {
        FailureAction::DeadLetter
    }
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<VideoPipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: VideoPipeline) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`JobExecutor::shutdown`] is called, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        self.queue.init().await?;

        let claim_task = tokio::spawn(Self::claim_loop(
            Arc::clone(&self.queue),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.job_semaphore),
            self.consumer_name.clone(),
            self.config.clone(),
            self.shutdown.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received, stopping executor");
                    break;
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "In-flight jobs still running at shutdown; they will be reclaimed"
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                CONSUME_BLOCK_MS,
                available.min(BATCH_SIZE),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!(count = jobs.len(), "Consumed jobs from queue");

        for (message_id, job) in jobs {
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::processing_failed("Semaphore closed"))?;
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Periodically take over messages abandoned by crashed workers.
    async fn claim_loop(
        queue: Arc<JobQueue>,
        pipeline: Arc<VideoPipeline>,
        semaphore: Arc<Semaphore>,
        consumer_name: String,
        config: WorkerConfig,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let min_idle_ms = u64::try_from(config.claim_min_idle.as_millis()).unwrap_or(u64::MAX);
        let mut interval = tokio::time::interval(config.claim_interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                _ = interval.tick() => {}
            }

            let jobs = match queue
                .claim_pending(&consumer_name, min_idle_ms, BATCH_SIZE)
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(error = %e, "Failed to claim pending jobs");
                    continue;
                }
            };

            if !jobs.is_empty() {
                info!(count = jobs.len(), "Claimed pending jobs");
            }

            for (message_id, job) in jobs {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    return;
                };
                let pipeline = Arc::clone(&pipeline);
                let queue = Arc::clone(&queue);

                tokio::spawn(async move {
                    let _permit = permit;
                    Self::execute_job(pipeline, queue, message_id, job).await;
                });
            }
        }
    }

    /// Execute a single job with retry and DLQ handling.
    async fn execute_job(
        pipeline: Arc<VideoPipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
    ) {
        let logger = JobLogger::new(job.job_id(), job.video_id());

        let result = match &job {
            QueueJob::ProcessVideo(j) => pipeline.process_with_logger(&j.video_id, &logger).await,
        };

        match result {
            Ok(outcome) => {
                debug!(job_id = %job.job_id(), outcome = outcome.as_str(), "Job finished");
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job.job_id(), error = %e, "Failed to ack job");
                }
                if let Err(e) = queue.clear_dedup(&job).await {
                    warn!(job_id = %job.job_id(), error = %e, "Failed to clear dedup key");
                }
            }
            Err(e) => {
                let retry_count = match queue.increment_retry(&message_id).await {
                    Ok(n) => n,
                    Err(qe) => {
                        warn!(job_id = %job.job_id(), error = %qe, "Failed to bump retry count");
                        u32::MAX
                    }
                };
                let max_retries = queue.max_retries();

                match failure_action(e.is_retryable(), retry_count, max_retries) {
                    FailureAction::Retry => {
                        info!(
                            job_id = %job.job_id(),
                            attempt = retry_count,
                            max_retries,
                            "Job will be retried"
                        );
                    }
                    FailureAction::DeadLetter => {
                        warn!(job_id = %job.job_id(), error = %e, "Moving job to DLQ");
                        if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                            error!(job_id = %job.job_id(), error = %dlq_err, "Failed to move job to DLQ");
                        }
                        if let Err(e) = queue.clear_dedup(&job).await {
                            warn!(job_id = %job.job_id(), error = %e, "Failed to clear dedup key");
                        }
                    }
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
