//! Decides whether a source file can go through the advanced packager.
//!
//! Shells out to `ffprobe ... -show_streams -of json` and looks at two things:
//! whether there is a video stream, and whether the container duration covers
//! at least one full segment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::infrastructure::process::ToolCommand;

/// Shortest source the segment packager accepts.
pub const MIN_DURATION_SECS: f64 = 2.0;

pub const REASON_NO_VIDEO: &str = "no video stream";
pub const REASON_TOO_SHORT: &str = "video is too short for segmented packaging";
pub const REASON_UNANALYZABLE: &str = "unable to analyze video file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible { reason: String },
}

impl Compatibility {
    fn incompatible(reason: &str) -> Self {
        Compatibility::Incompatible {
            reason: reason.to_string(),
        }
    }

    #[cfg(test)]
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }
}

#[async_trait]
pub trait CompatibilityProbe: Send + Sync {
    async fn check(&self, path: &Path) -> Compatibility;
}

#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    #[rustfmt::skip]
    fn command(&self, path: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "error",
            "-show_entries", "format=format_name,duration",
            "-show_streams",
            "-of", "json",
        ])
        .arg(path.to_string_lossy())
        .timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl CompatibilityProbe for FfprobeProber {
    async fn check(&self, path: &Path) -> Compatibility {
        match self.command(path).execute().await {
            Ok(output) => assess_json(&output.stdout),
            Err(e) => {
                warn!("ffprobe failed on {}: {}", path.display(), e);
                Compatibility::incompatible(REASON_UNANALYZABLE)
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

/// Parses raw ffprobe JSON. Malformed output is treated like a failed probe.
pub fn assess_json(raw: &str) -> Compatibility {
    match serde_json::from_str::<ProbeOutput>(raw) {
        Ok(output) => assess(&output),
        Err(e) => {
            warn!("ffprobe JSON parse error: {}", e);
            Compatibility::incompatible(REASON_UNANALYZABLE)
        }
    }
}

fn assess(output: &ProbeOutput) -> Compatibility {
    let has_video = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"));
    if !has_video {
        return Compatibility::incompatible(REASON_NO_VIDEO);
    }

    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .unwrap_or(0.0);
    debug!("Probed duration {:.3}s", duration);

    if duration < MIN_DURATION_SECS {
        return Compatibility::incompatible(REASON_TOO_SHORT);
    }

    Compatibility::Compatible
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(streams: &[&str], duration: Option<&str>) -> String {
        let streams: Vec<_> = streams
            .iter()
            .map(|t| serde_json::json!({ "codec_type": t }))
            .collect();
        let mut format = serde_json::json!({ "format_name": "mov,mp4,m4a,3gp,3g2,mj2" });
        if let Some(d) = duration {
            format["duration"] = serde_json::json!(d);
        }
        serde_json::json!({ "streams": streams, "format": format }).to_string()
    }

    fn reason(c: Compatibility) -> String {
        match c {
            Compatibility::Incompatible { reason } => reason,
            Compatibility::Compatible => panic!("expected incompatible verdict"),
        }
    }

    #[test]
    fn video_with_audio_long_enough_is_compatible() {
        let verdict = assess_json(&probe_json(&["video", "audio"], Some("3.000000")));
        assert!(verdict.is_compatible());
    }

    #[test]
    fn exactly_two_seconds_is_enough() {
        assert!(assess_json(&probe_json(&["video"], Some("2.0"))).is_compatible());
    }

    #[test]
    fn audio_only_has_no_video_stream() {
        let verdict = assess_json(&probe_json(&["audio"], Some("120.5")));
        assert_eq!(reason(verdict), REASON_NO_VIDEO);
    }

    #[test]
    fn no_streams_at_all_has_no_video_stream() {
        let verdict = assess_json(&probe_json(&[], Some("10")));
        assert_eq!(reason(verdict), REASON_NO_VIDEO);
    }

    #[test]
    fn short_clip_is_too_short() {
        let verdict = assess_json(&probe_json(&["video", "audio"], Some("1.2")));
        assert_eq!(reason(verdict), REASON_TOO_SHORT);
    }

    #[test]
    fn short_clip_is_incompatible_with_or_without_video() {
        assert!(!assess_json(&probe_json(&["video"], Some("0.5"))).is_compatible());
        assert!(!assess_json(&probe_json(&["audio"], Some("0.5"))).is_compatible());
    }

    #[test]
    fn missing_or_garbage_duration_counts_as_zero() {
        assert_eq!(reason(assess_json(&probe_json(&["video"], None))), REASON_TOO_SHORT);
        assert_eq!(reason(assess_json(&probe_json(&["video"], Some("N/A")))), REASON_TOO_SHORT);
    }

    #[test]
    fn malformed_output_is_unanalyzable() {
        assert_eq!(reason(assess_json("")), REASON_UNANALYZABLE);
        assert_eq!(reason(assess_json("{\"streams\": 3}")), REASON_UNANALYZABLE);
    }

    #[test]
    fn command_requests_streams_and_format_as_json() {
        let prober = FfprobeProber::new(PathBuf::from("ffprobe"), Duration::from_secs(5));
        let cmd = prober.command(Path::new("/tmp/in.mov"));
        let args = cmd.get_args().join(" ");
        assert!(args.contains("-show_streams"));
        assert!(args.contains("-show_entries format=format_name,duration"));
        assert!(args.contains("-of json"));
        assert!(args.ends_with("/tmp/in.mov"));
    }

    #[tokio::test]
    async fn missing_ffprobe_binary_is_unanalyzable() {
        let prober = FfprobeProber::new(
            PathBuf::from("nonexistent_ffprobe_xyz"),
            Duration::from_secs(5),
        );
        let verdict = prober.check(Path::new("/tmp/does-not-matter.mov")).await;
        assert_eq!(reason(verdict), REASON_UNANALYZABLE);
    }
}
