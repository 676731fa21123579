//! Video ingestion worker.
//!
//! This crate provides:
//! - The per-video processing pipeline (probe, poster, transcode, status)
//! - Job executor with bounded concurrency, retries and dead-lettering
//! - Structured job logging and pipeline metrics
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{PipelineOutcome, TranscodeReport, VideoPipeline};
