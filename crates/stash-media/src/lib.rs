#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for video ingestion.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with a per-process timeout
//! - FFprobe inspection into a [`ProbeResult`]
//! - The format policy deciding skip, remux or full transcode
//! - Poster frame extraction
//! - Remux/transcode execution with a size-regression guard
//! - Per-job scratch space that is removed on drop

pub mod command;
pub mod error;
pub mod policy;
pub mod poster;
pub mod probe;
pub mod scratch;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, Encoder, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use policy::{decide, scale_to_width, TranscodeDecision, TranscodeTarget};
pub use poster::{extract_poster, PosterPlan};
pub use probe::{parse_ffprobe_output, Ffprobe, MediaProber, ProbeResult};
pub use scratch::ScratchSpace;
pub use transcode::{run_transcode, TranscodeOutcome};
