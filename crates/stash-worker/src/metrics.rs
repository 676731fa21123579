//! Pipeline metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

/// Metric name constants.
pub mod names {
    /// Pipeline runs by outcome.
    pub const JOBS_TOTAL: &str = "video_pipeline_jobs_total";

    /// Format policy decisions.
    pub const TRANSCODE_DECISIONS_TOTAL: &str = "video_transcode_decisions_total";

    /// Tolerated step failures by stage (poster, transcode).
    pub const DEGRADED_STEPS_TOTAL: &str = "video_pipeline_degraded_steps_total";

    /// Wall time of a pipeline run.
    pub const JOB_DURATION_SECONDS: &str = "video_pipeline_job_duration_seconds";
}

/// Record the end of a pipeline run.
pub fn record_job(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record a format policy decision.
pub fn record_decision(decision: &'static str) {
    counter!(names::TRANSCODE_DECISIONS_TOTAL, "decision" => decision).increment(1);
}

/// Record a poster or transcode failure that did not fail the job.
pub fn record_degraded(stage: &'static str) {
    counter!(names::DEGRADED_STEPS_TOTAL, "stage" => stage).increment(1);
}

/// Serve Prometheus metrics on `METRICS_ADDR` if it is set.
///
/// Must be called from inside the tokio runtime.
pub fn init_exporter_from_env() {
    let Ok(raw) = std::env::var("METRICS_ADDR") else {
        return;
    };

    let addr: SocketAddr = match raw.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(value = %raw, error = %e, "Ignoring invalid METRICS_ADDR");
            return;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(%addr, "Serving Prometheus metrics"),
        Err(e) => warn!(error = %e, "Failed to install Prometheus exporter"),
    }
}
