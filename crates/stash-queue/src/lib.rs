//! Redis Streams job queue.
//!
//! This crate provides:
//! - Video processing jobs with idempotency keys
//! - Enqueueing with one-hour deduplication
//! - Consumer-group consumption, reclaiming of abandoned messages
//! - Retry counting and a dead-letter stream

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{ProcessVideoJob, QueueJob};
pub use queue::{JobQueue, QueueConfig};
