//! Poster frame extraction.

use std::path::{Path, PathBuf};
use stash_models::encoding::{POSTER_MAX_SEEK_SECS, POSTER_MAX_WIDTH, POSTER_SEEK_FRACTION};
use tracing::debug;

use crate::command::{Encoder, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::policy::scale_to_width;
use crate::probe::ProbeResult;

/// Where and at what size to grab the poster frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosterPlan {
    pub seek_secs: f64,
    pub width: u32,
    pub height: u32,
}

impl PosterPlan {
    /// Seek to `min(1s, 10% of duration)` so short clips still land on a
    /// frame; cap width at 1280 with an even height.
    pub fn for_probe(probe: &ProbeResult) -> Self {
        let seek_secs = (probe.duration.max(0.0) * POSTER_SEEK_FRACTION).min(POSTER_MAX_SEEK_SECS);
        let (width, height) = scale_to_width(probe.width, probe.height, POSTER_MAX_WIDTH);
        Self {
            seek_secs,
            width,
            height,
        }
    }

    /// FFmpeg command writing a single JPEG frame.
    pub fn command(&self, source: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(source, output)
            .seek(self.seek_secs)
            .single_frame()
            .scale(self.width, self.height)
            .output_arg("-q:v")
            .output_arg("2")
    }
}

/// Extract a JPEG poster of `source` into `output`.
pub async fn extract_poster(
    encoder: &dyn Encoder,
    source: &Path,
    probe: &ProbeResult,
    output: &Path,
) -> MediaResult<PathBuf> {
    let plan = PosterPlan::for_probe(probe);
    debug!(
        seek = plan.seek_secs,
        width = plan.width,
        height = plan.height,
        "Extracting poster frame"
    );

    encoder.run(&plan.command(source, output)).await?;

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(output.to_path_buf()),
        _ => Err(MediaError::OutputMissing(output.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(duration: f64, width: u32, height: u32) -> ProbeResult {
        ProbeResult {
            video_codec: Some("h264".into()),
            audio_codec: None,
            width,
            height,
            duration,
            container: "mp4".into(),
            byte_size: 10,
            valid: true,
        }
    }

    #[test]
    fn test_seek_bound() {
        assert!((PosterPlan::for_probe(&probe(3.0, 640, 360)).seek_secs - 0.3).abs() < 1e-9);
        assert!((PosterPlan::for_probe(&probe(300.0, 640, 360)).seek_secs - 1.0).abs() < 1e-9);
        assert_eq!(PosterPlan::for_probe(&probe(0.0, 640, 360)).seek_secs, 0.0);
    }

    #[test]
    fn test_poster_size() {
        let plan = PosterPlan::for_probe(&probe(10.0, 1920, 1085));
        assert_eq!((plan.width, plan.height), (1280, 724));

        let plan = PosterPlan::for_probe(&probe(10.0, 640, 479));
        assert_eq!((plan.width, plan.height), (640, 480));
    }

    #[test]
    fn test_poster_command() {
        let plan = PosterPlan::for_probe(&probe(3.0, 1920, 1080));
        let args = plan
            .command(Path::new("/s/original.mp4"), Path::new("/s/poster.jpg"))
            .build_args()
            .join(" ");
        assert!(args.contains("-ss 0.300 -i /s/original.mp4"));
        assert!(args.contains("-vframes 1"));
        assert!(args.contains("scale=1280:720"));
        assert!(args.ends_with("/s/poster.jpg"));
    }

    struct NoOutput;

    #[async_trait::async_trait]
    impl Encoder for NoOutput {
        async fn run(&self, _cmd: &FfmpegCommand) -> MediaResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("poster.jpg");
        let err = extract_poster(&NoOutput, Path::new("in.mp4"), &probe(5.0, 640, 360), &out)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OutputMissing(_)));
    }
}
