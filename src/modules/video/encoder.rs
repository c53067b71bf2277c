//! External encoder adapters, one per [`Backend`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::EncodeError;
use super::model::{
    AUDIO_RENDITION, Backend, DASH_MANIFEST, EncodeJob, MASTER_MANIFEST, RenditionSet,
    VIDEO_LADDER,
};
use crate::infrastructure::process::ToolCommand;

pub const SEGMENT_DURATION_SECS: u32 = 10;

#[async_trait]
pub trait Encoder: Send + Sync {
    fn backend(&self) -> Backend;

    /// Runs the encoder for `job` and returns whatever it wrote under
    /// `job.output_dir`. The caller verifies completeness.
    async fn encode(&self, job: &EncodeJob) -> Result<RenditionSet, EncodeError>;
}

/// Single-bitrate HLS: one playlist plus flat `.ts` segments.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg_path, timeout }
    }

    #[rustfmt::skip]
    pub fn command(&self, job: &EncodeJob) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(["-y", "-i"])
            .arg(path_arg(&job.source))
            .args([
                "-profile:v", "baseline",
                "-level", "3.0",
                "-start_number", "0",
                "-hls_time",
            ])
            .arg(SEGMENT_DURATION_SECS.to_string())
            .args(["-hls_list_size", "0", "-f", "hls"])
            .arg(path_arg(&job.master_manifest()))
            .timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn backend(&self) -> Backend {
        Backend::Simple
    }

    async fn encode(&self, job: &EncodeJob) -> Result<RenditionSet, EncodeError> {
        run(self.command(job), job).await
    }
}

/// Multi-bitrate HLS + DASH through Shaka Packager: an audio rendition and
/// the three-rung video ladder, each in its own directory.
#[derive(Debug, Clone)]
pub struct ShakaPackagerEncoder {
    packager_path: PathBuf,
    timeout: Duration,
}

impl ShakaPackagerEncoder {
    pub fn new(packager_path: PathBuf, timeout: Duration) -> Self {
        Self {
            packager_path,
            timeout,
        }
    }

    pub fn command(&self, job: &EncodeJob) -> ToolCommand {
        let input = path_arg(&job.source);
        let out = &job.output_dir;
        let mut cmd = ToolCommand::new(self.packager_path.clone());

        let audio = out.join(AUDIO_RENDITION);
        cmd.arg(format!(
            "in={input},stream=audio,segment_template={seg},playlist_name={playlist},hls_group_id=audio,hls_name=ENGLISH",
            seg = path_arg(&audio.join("$Number$.ts")),
            playlist = path_arg(&audio.join("main.m3u8")),
        ));

        for rung in VIDEO_LADDER {
            let dir = out.join(rung.dir);
            cmd.arg(format!(
                "in={input},stream=video,segment_template={seg},playlist_name={playlist},iframe_playlist_name={iframe},resolution={w}x{h},bps={bps}",
                seg = path_arg(&dir.join("$Number$.ts")),
                playlist = path_arg(&dir.join("main.m3u8")),
                iframe = path_arg(&dir.join("iframe.m3u8")),
                w = rung.width,
                h = rung.height,
                bps = rung.bitrate,
            ));
        }

        cmd.arg("--hls_master_playlist_output")
            .arg(path_arg(&out.join(MASTER_MANIFEST)))
            .arg("--segment_duration")
            .arg(SEGMENT_DURATION_SECS.to_string())
            .args(["--hls_playlist_type", "VOD", "--default_language", "en"])
            .arg("--mpd_output")
            .arg(path_arg(&out.join(DASH_MANIFEST)))
            .args(["--hls_media_sequence_number", "0"])
            .timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl Encoder for ShakaPackagerEncoder {
    fn backend(&self) -> Backend {
        Backend::Advanced
    }

    async fn encode(&self, job: &EncodeJob) -> Result<RenditionSet, EncodeError> {
        run(self.command(job), job).await
    }
}

async fn run(cmd: ToolCommand, job: &EncodeJob) -> Result<RenditionSet, EncodeError> {
    info!(
        "Transcoding '{}' with {} ({}) into {}",
        job.name,
        job.backend,
        cmd.program_name(),
        job.output_dir.display()
    );

    let output = cmd.execute().await?;
    if let Some(last) = output.stderr.lines().last() {
        debug!("{} finished: {}", cmd.program_name(), last);
    }

    let root = job.output_dir.clone();
    tokio::task::spawn_blocking(move || RenditionSet::scan(&root))
        .await
        .map_err(std::io::Error::other)?
        .map_err(EncodeError::from)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// The two adapters the pipeline picks from.
#[derive(Clone)]
pub struct EncoderSet {
    simple: Arc<dyn Encoder>,
    advanced: Arc<dyn Encoder>,
}

impl EncoderSet {
    pub fn new(simple: Arc<dyn Encoder>, advanced: Arc<dyn Encoder>) -> Self {
        debug_assert_eq!(simple.backend(), Backend::Simple);
        debug_assert_eq!(advanced.backend(), Backend::Advanced);
        Self { simple, advanced }
    }

    pub fn for_backend(&self, backend: Backend) -> &Arc<dyn Encoder> {
        match backend {
            Backend::Simple => &self.simple,
            Backend::Advanced => &self.advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(backend: Backend) -> EncodeJob {
        EncodeJob {
            source: PathBuf::from("/uploads/abc_clip.mov"),
            name: "clip".to_string(),
            backend,
            output_dir: PathBuf::from("/videos/clip"),
        }
    }

    #[test]
    fn ffmpeg_command_is_single_bitrate_hls() {
        let enc = FfmpegEncoder::new(PathBuf::from("ffmpeg"), Duration::from_secs(60));
        let args = enc.command(&job(Backend::Simple)).get_args().join(" ");

        assert!(args.starts_with("-y -i /uploads/abc_clip.mov"));
        assert!(args.contains("-profile:v baseline -level 3.0"));
        assert!(args.contains("-start_number 0"));
        assert!(args.contains("-hls_time 10"));
        assert!(args.contains("-hls_list_size 0"));
        assert!(args.ends_with("-f hls /videos/clip/index.m3u8"));
    }

    #[test]
    fn packager_command_has_audio_and_three_video_rungs() {
        let enc = ShakaPackagerEncoder::new(PathBuf::from("packager"), Duration::from_secs(60));
        let cmd = enc.command(&job(Backend::Advanced));
        let args = cmd.get_args();

        let descriptors: Vec<_> = args.iter().filter(|a| a.starts_with("in=")).collect();
        assert_eq!(descriptors.len(), 4);
        assert!(descriptors[0].contains("stream=audio"));
        assert!(descriptors[0].contains("segment_template=/videos/clip/audio/$Number$.ts"));
        assert!(descriptors[0].contains("hls_group_id=audio,hls_name=ENGLISH"));

        assert!(descriptors[1].contains("playlist_name=/videos/clip/video_low/main.m3u8"));
        assert!(descriptors[1].contains("resolution=640x360,bps=800000"));
        assert!(descriptors[2].contains("resolution=854x480,bps=1500000"));
        assert!(descriptors[3].contains("iframe_playlist_name=/videos/clip/video_high/iframe.m3u8"));
        assert!(descriptors[3].contains("resolution=1280x720,bps=3000000"));
    }

    #[test]
    fn packager_command_writes_master_and_dash_manifests() {
        let enc = ShakaPackagerEncoder::new(PathBuf::from("packager"), Duration::from_secs(60));
        let args = enc.command(&job(Backend::Advanced)).get_args().join(" ");

        assert!(args.contains("--hls_master_playlist_output /videos/clip/index.m3u8"));
        assert!(args.contains("--mpd_output /videos/clip/manifest.mpd"));
        assert!(args.contains("--segment_duration 10"));
        assert!(args.contains("--hls_playlist_type VOD"));
        assert!(args.contains("--default_language en"));
        assert!(args.contains("--hls_media_sequence_number 0"));
    }

    #[test]
    fn every_advanced_rendition_dir_is_referenced_by_the_packager() {
        let enc = ShakaPackagerEncoder::new(PathBuf::from("packager"), Duration::from_secs(60));
        let args = enc.command(&job(Backend::Advanced)).get_args().join(" ");
        for dir in Backend::Advanced.rendition_dirs() {
            assert!(args.contains(&format!("/videos/clip/{dir}/main.m3u8")), "missing {dir}");
        }
    }

    #[tokio::test]
    async fn failed_process_is_an_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let enc = FfmpegEncoder::new(
            PathBuf::from("nonexistent_ffmpeg_xyz"),
            Duration::from_secs(5),
        );
        let mut job = job(Backend::Simple);
        job.output_dir = dir.path().to_path_buf();

        let err = enc.encode(&job).await.unwrap_err();
        assert!(matches!(err, EncodeError::Process(_)));
    }

    #[test]
    fn encoder_set_hands_out_the_matching_adapter() {
        let set = EncoderSet::new(
            Arc::new(FfmpegEncoder::new(PathBuf::from("ffmpeg"), Duration::from_secs(1))),
            Arc::new(ShakaPackagerEncoder::new(PathBuf::from("packager"), Duration::from_secs(1))),
        );
        assert_eq!(set.for_backend(Backend::Simple).backend(), Backend::Simple);
        assert_eq!(set.for_backend(Backend::Advanced).backend(), Backend::Advanced);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn encoder_set_rejects_swapped_slots() {
        EncoderSet::new(
            Arc::new(ShakaPackagerEncoder::new(PathBuf::from("packager"), Duration::from_secs(1))),
            Arc::new(FfmpegEncoder::new(PathBuf::from("ffmpeg"), Duration::from_secs(1))),
        );
    }
}
