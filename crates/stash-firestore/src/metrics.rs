//! Firestore request metrics.

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Requests by operation and HTTP status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Guarded status writes that lost to a concurrent change.
    pub const STATUS_CONFLICTS_TOTAL: &str = "firestore_status_conflicts_total";
}

/// Record a completed request.
pub fn record_request(operation: &'static str, status: u16, latency_secs: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}

/// Record a retry attempt.
pub fn record_retry(operation: &'static str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation).increment(1);
}

/// Record a status transition refused because the record moved on.
pub fn record_status_conflict(to: &'static str) {
    counter!(names::STATUS_CONFLICTS_TOTAL, "to" => to).increment(1);
}
