//! Firestore REST API client.
//!
//! This crate provides:
//! - The [`VideoStore`] capability the video pipeline persists through
//! - A Firestore-backed video repository with guarded status transitions
//! - Service account authentication via gcp_auth with token caching
//! - Retry with exponential backoff and jitter, request metrics

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod video_repo;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use video_repo::{FirestoreVideoRepository, VideoStore, VIDEOS_COLLECTION};
