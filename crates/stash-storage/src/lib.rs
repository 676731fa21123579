//! Attachment blob storage.
//!
//! This crate provides:
//! - The [`BlobStore`] capability the video pipeline downloads and uploads through
//! - A Cloudflare R2 implementation over the S3 API

pub mod blob;
pub mod client;
pub mod error;

pub use blob::BlobStore;
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
