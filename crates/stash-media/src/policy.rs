//! Format policy: the cheapest path from a probed source to web playback.

use serde::{Deserialize, Serialize};
use stash_models::encoding::{MAX_WEB_WIDTH, TARGET_CONTAINER, WEB_AUDIO_CODECS, WEB_VIDEO_CODECS};

use crate::probe::ProbeResult;

/// Output frame size for a full transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeTarget {
    pub width: u32,
    pub height: u32,
}

/// What the transcoder should do with a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TranscodeDecision {
    /// Already web-ready; play the original.
    Skip,
    /// Compatible streams in the wrong container; stream-copy into mp4.
    Remux,
    /// Re-encode to H.264/AAC at the given size.
    FullTranscode(TranscodeTarget),
}

impl TranscodeDecision {
    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeDecision::Skip => "skip",
            TranscodeDecision::Remux => "remux",
            TranscodeDecision::FullTranscode(_) => "full_transcode",
        }
    }
}

/// Decide how to make `probe` playable on the web.
///
/// Streams are compatible when the video codec is h264/avc1, audio is
/// absent or AAC, and the frame is at most 1920 wide. Compatible streams
/// in an mp4 are skipped, in any other container they are remuxed;
/// everything else is fully transcoded.
pub fn decide(probe: &ProbeResult) -> TranscodeDecision {
    if streams_web_compatible(probe) {
        if probe.container.eq_ignore_ascii_case(TARGET_CONTAINER) {
            TranscodeDecision::Skip
        } else {
            TranscodeDecision::Remux
        }
    } else {
        // yuv420p needs both dimensions even
        let width = probe.width.min(MAX_WEB_WIDTH);
        let width = (width - width % 2).max(2);
        TranscodeDecision::FullTranscode(TranscodeTarget {
            width,
            height: even_height(width, probe.width, probe.height),
        })
    }
}

fn streams_web_compatible(probe: &ProbeResult) -> bool {
    let video_ok = probe
        .video_codec
        .as_deref()
        .is_some_and(|c| WEB_VIDEO_CODECS.iter().any(|w| c.eq_ignore_ascii_case(w)));
    let audio_ok = probe
        .audio_codec
        .as_deref()
        .map_or(true, |c| WEB_AUDIO_CODECS.iter().any(|w| c.eq_ignore_ascii_case(w)));

    video_ok && audio_ok && probe.width <= MAX_WEB_WIDTH
}

/// Fit `width x height` into `max_width`, preserving aspect ratio.
///
/// Width becomes `min(width, max_width)`; height is the truncated
/// proportional height, bumped by one when odd.
pub fn scale_to_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let target_width = width.min(max_width);
    (target_width, even_height(target_width, width, height))
}

fn even_height(target_width: u32, width: u32, height: u32) -> u32 {
    if width == 0 {
        return height + height % 2;
    }
    let raw = (u64::from(target_width) * u64::from(height) / u64::from(width)) as u32;
    let even = raw + raw % 2;
    even.max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(video: &str, audio: Option<&str>, width: u32, height: u32, container: &str) -> ProbeResult {
        ProbeResult {
            video_codec: Some(video.to_string()),
            audio_codec: audio.map(str::to_string),
            width,
            height,
            duration: 42.0,
            container: container.to_string(),
            byte_size: 1_000_000,
            valid: true,
        }
    }

    #[test]
    fn test_web_ready_mp4_is_skipped() {
        for (video, audio, width) in [
            ("h264", Some("aac"), 1920),
            ("avc1", None, 640),
            ("h264", None, 1),
        ] {
            let mut p = probe(video, audio, width, 1080, "mp4");
            assert_eq!(decide(&p), TranscodeDecision::Skip);

            // duration and size never matter
            p.duration = 7200.0;
            p.byte_size = u64::MAX;
            assert_eq!(decide(&p), TranscodeDecision::Skip);
        }
    }

    #[test]
    fn test_compatible_mov_is_remuxed() {
        assert_eq!(
            decide(&probe("h264", Some("aac"), 1280, 720, "mov")),
            TranscodeDecision::Remux
        );
        assert_eq!(
            decide(&probe("h264", None, 1920, 1080, "mkv")),
            TranscodeDecision::Remux
        );
    }

    #[test]
    fn test_vp9_always_transcodes() {
        for container in ["mp4", "webm", "mov"] {
            for width in [320, 1920, 3840] {
                let decision = decide(&probe("vp9", Some("aac"), width, 720, container));
                assert!(matches!(decision, TranscodeDecision::FullTranscode(_)));
            }
        }
    }

    #[test]
    fn test_incompatible_audio_transcodes() {
        let decision = decide(&probe("h264", Some("opus"), 1280, 720, "mp4"));
        assert_eq!(
            decision,
            TranscodeDecision::FullTranscode(TranscodeTarget { width: 1280, height: 720 })
        );
    }

    #[test]
    fn test_oversized_frame_is_scaled() {
        let decision = decide(&probe("h264", Some("aac"), 3840, 2160, "mp4"));
        assert_eq!(
            decision,
            TranscodeDecision::FullTranscode(TranscodeTarget { width: 1920, height: 1080 })
        );
    }

    #[test]
    fn test_scaled_height_is_even() {
        // 1280 * 1081 / 1920 = 720.67 -> 720
        assert_eq!(scale_to_width(1920, 1081, 1280), (1280, 720));
        // 1280 * 1085 / 1920 = 723.33 -> 723 -> 724
        assert_eq!(scale_to_width(1920, 1085, 1280), (1280, 724));
        // no scaling, odd source height
        assert_eq!(scale_to_width(640, 361, 1920), (640, 362));

        for h in 1..500 {
            let (_, height) = scale_to_width(1919, h, 1280);
            assert_eq!(height % 2, 0, "height {h}");
        }
    }

    #[test]
    fn test_transcode_width_is_even() {
        let decision = decide(&probe("mpeg4", None, 641, 481, "avi"));
        let TranscodeDecision::FullTranscode(target) = decision else {
            panic!("expected transcode, got {decision:?}");
        };
        assert_eq!(target.width, 640);
        assert_eq!(target.height % 2, 0);
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(TranscodeDecision::Skip.as_str(), "skip");
        assert_eq!(TranscodeDecision::Remux.as_str(), "remux");
        assert_eq!(
            TranscodeDecision::FullTranscode(TranscodeTarget { width: 2, height: 2 }).as_str(),
            "full_transcode"
        );
    }
}
