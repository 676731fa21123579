//! Video ingestion worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stash_firestore::{FirestoreClient, FirestoreVideoRepository};
use stash_media::{Ffprobe, FfmpegRunner};
use stash_queue::JobQueue;
use stash_storage::R2Client;
use stash_worker::{JobExecutor, VideoPipeline, WorkerConfig};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,stash=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn exit_with(message: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", message, err);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    // TLS for reqwest and the AWS SDK
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    stash_worker::metrics::init_exporter_from_env();

    info!("Starting stash-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let firestore = match FirestoreClient::from_env().await {
        Ok(client) => client,
        Err(e) => exit_with("Failed to create Firestore client", e),
    };
    let storage = match R2Client::from_env() {
        Ok(client) => client,
        Err(e) => exit_with("Failed to create R2 client", e),
    };
    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => exit_with("Failed to create job queue", e),
    };

    let encoder = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout.as_secs());
    let pipeline = VideoPipeline::new(
        Arc::new(FirestoreVideoRepository::new(firestore)),
        Arc::new(storage),
        Arc::new(Ffprobe),
        Arc::new(encoder),
        config.work_dir.clone(),
    )
    .with_job_timeout(config.job_timeout);

    let executor = Arc::new(JobExecutor::new(config, queue, pipeline));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        exit_with("Executor error", e);
    }

    info!("Worker shutdown complete");
}
