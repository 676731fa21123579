//! Remux and transcode execution.

use std::path::{Path, PathBuf};
use stash_models::EncodingConfig;
use tracing::{debug, info};

use crate::command::{Encoder, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::policy::{TranscodeDecision, TranscodeTarget};
use crate::probe::ProbeResult;

/// Result of carrying out a [`TranscodeDecision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// Source already web-ready; nothing written.
    Skipped,
    /// Streams copied into an mp4 at this path.
    Remuxed(PathBuf),
    /// Re-encoded output at this path.
    Transcoded(PathBuf),
    /// Re-encode produced a bigger file than the source; output deleted.
    DiscardedLarger { output_bytes: u64, original_bytes: u64 },
}

impl TranscodeOutcome {
    /// File to attach as the transcoded rendition, if any.
    pub fn output(&self) -> Option<&Path> {
        match self {
            TranscodeOutcome::Remuxed(path) | TranscodeOutcome::Transcoded(path) => Some(path),
            TranscodeOutcome::Skipped | TranscodeOutcome::DiscardedLarger { .. } => None,
        }
    }

    /// Log/metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeOutcome::Skipped => "skipped",
            TranscodeOutcome::Remuxed(_) => "remuxed",
            TranscodeOutcome::Transcoded(_) => "transcoded",
            TranscodeOutcome::DiscardedLarger { .. } => "discarded_larger",
        }
    }
}

/// Stream-copy into mp4 with fast-start.
pub fn remux_command(source: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(source, output).stream_copy().faststart()
}

/// Full H.264/AAC re-encode at `target`.
pub fn transcode_command(
    source: &Path,
    output: &Path,
    target: TranscodeTarget,
    config: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(source, output)
        .scale(target.width, target.height)
        .output_args(config.to_ffmpeg_args())
}

/// Carry out `decision` for `source`, writing to `output`.
///
/// A full transcode whose output is larger than the source is discarded.
/// Remux output is kept regardless of size.
pub async fn run_transcode(
    encoder: &dyn Encoder,
    decision: TranscodeDecision,
    source: &Path,
    probe: &ProbeResult,
    output: &Path,
    config: &EncodingConfig,
) -> MediaResult<TranscodeOutcome> {
    match decision {
        TranscodeDecision::Skip => {
            debug!("Source is web-ready, skipping transcode");
            Ok(TranscodeOutcome::Skipped)
        }
        TranscodeDecision::Remux => {
            encoder.run(&remux_command(source, output)).await?;
            output_size(output).await?;
            Ok(TranscodeOutcome::Remuxed(output.to_path_buf()))
        }
        TranscodeDecision::FullTranscode(target) => {
            encoder
                .run(&transcode_command(source, output, target, config))
                .await?;
            let output_bytes = output_size(output).await?;
            let original_bytes = match probe.byte_size {
                0 => tokio::fs::metadata(source).await?.len(),
                n => n,
            };

            if output_bytes > original_bytes {
                info!(
                    output_bytes,
                    original_bytes, "Transcoded output larger than original, discarding"
                );
                tokio::fs::remove_file(output).await?;
                return Ok(TranscodeOutcome::DiscardedLarger {
                    output_bytes,
                    original_bytes,
                });
            }

            Ok(TranscodeOutcome::Transcoded(output.to_path_buf()))
        }
    }
}

async fn output_size(output: &Path) -> MediaResult<u64> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        _ => Err(MediaError::OutputMissing(output.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes `size` bytes to the command's output and remembers the args.
    struct SizedEncoder {
        size: Option<usize>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl SizedEncoder {
        fn writing(size: usize) -> Self {
            Self {
                size: Some(size),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn silent() -> Self {
            Self {
                size: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Encoder for SizedEncoder {
        async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
            self.calls.lock().unwrap().push(cmd.build_args());
            if let Some(size) = self.size {
                tokio::fs::write(cmd.output_path(), vec![0u8; size]).await?;
            }
            Ok(())
        }
    }

    fn probe(byte_size: u64) -> ProbeResult {
        ProbeResult {
            video_codec: Some("vp9".into()),
            audio_codec: Some("opus".into()),
            width: 1280,
            height: 720,
            duration: 10.0,
            container: "webm".into(),
            byte_size,
            valid: true,
        }
    }

    const TARGET: TranscodeTarget = TranscodeTarget {
        width: 1280,
        height: 720,
    };

    #[tokio::test]
    async fn test_skip_runs_nothing() {
        let encoder = SizedEncoder::writing(10);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::Skip,
            Path::new("in.mp4"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TranscodeOutcome::Skipped);
        assert!(outcome.output().is_none());
        assert!(encoder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remux_kept_even_if_larger() {
        let encoder = SizedEncoder::writing(500);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::Remux,
            Path::new("in.mov"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TranscodeOutcome::Remuxed(out.clone()));
        let args = encoder.calls.lock().unwrap()[0].join(" ");
        assert!(args.contains("-c copy -movflags +faststart"));
    }

    #[tokio::test]
    async fn test_full_transcode_args_and_output() {
        let encoder = SizedEncoder::writing(50);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::FullTranscode(TARGET),
            Path::new("in.webm"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.output(), Some(out.as_path()));
        let args = encoder.calls.lock().unwrap()[0].join(" ");
        for expected in [
            "scale=1280:720",
            "-c:v libx264",
            "-preset fast",
            "-crf 28",
            "-pix_fmt yuv420p",
            "-c:a aac",
            "-movflags +faststart",
        ] {
            assert!(args.contains(expected), "missing {expected} in {args}");
        }
    }

    #[tokio::test]
    async fn test_larger_transcode_discarded() {
        let encoder = SizedEncoder::writing(101);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::FullTranscode(TARGET),
            Path::new("in.webm"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            TranscodeOutcome::DiscardedLarger {
                output_bytes: 101,
                original_bytes: 100
            }
        );
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_equal_size_kept() {
        let encoder = SizedEncoder::writing(100);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::FullTranscode(TARGET),
            Path::new("in.webm"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, TranscodeOutcome::Transcoded(_)));
    }

    #[tokio::test]
    async fn test_original_size_falls_back_to_file() {
        let encoder = SizedEncoder::writing(64);
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("original.webm");
        std::fs::write(&src, vec![1u8; 32]).unwrap();
        let out = dir.path().join("out.mp4");

        let outcome = run_transcode(
            &encoder,
            TranscodeDecision::FullTranscode(TARGET),
            &src,
            &probe(0),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            TranscodeOutcome::DiscardedLarger {
                output_bytes: 64,
                original_bytes: 32
            }
        );
    }

    #[tokio::test]
    async fn test_missing_output_is_error() {
        let encoder = SizedEncoder::silent();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");

        let err = run_transcode(
            &encoder,
            TranscodeDecision::Remux,
            Path::new("in.mov"),
            &probe(100),
            &out,
            &EncodingConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::OutputMissing(_)));
    }
}
