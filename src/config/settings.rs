use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub s3_endpoint: String,
    /// Endpoint baked into playback URLs. Falls back to `s3_endpoint`.
    pub s3_public_endpoint: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub static_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub packager_path: PathBuf,
    pub encoder_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub upload_concurrency: usize,
    pub max_concurrent_jobs: usize,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        let s3_endpoint = env::get_or(EnvKey::S3Endpoint, "http://localhost:9000");
        let s3_public_endpoint = env::get_or(EnvKey::S3PublicEndpoint, &s3_endpoint);

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 8001),
            s3_endpoint,
            s3_public_endpoint,
            s3_bucket: env::get_or(EnvKey::S3Bucket, "my-bucket"),
            s3_region: env::get_or(EnvKey::S3Region, "us-east-1"),
            s3_access_key: env::get_or(EnvKey::S3AccessKey, "minio"),
            s3_secret_key: env::get_or(EnvKey::S3SecretKey, "minio123"),
            upload_dir: env::get_or(EnvKey::UploadDir, "./uploads").into(),
            output_dir: env::get_or(EnvKey::OutputDir, "./videos").into(),
            static_dir: env::get_or(EnvKey::StaticDir, "./public").into(),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg").into(),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe").into(),
            packager_path: env::get_or(EnvKey::PackagerPath, "packager").into(),
            encoder_timeout_secs: env::get_parsed(EnvKey::EncoderTimeoutSecs, 3600),
            probe_timeout_secs: env::get_parsed(EnvKey::ProbeTimeoutSecs, 30),
            upload_concurrency: env::get_parsed(EnvKey::UploadConcurrency, 8).max(1),
            max_concurrent_jobs: env::get_parsed(EnvKey::MaxConcurrentJobs, 2).max(1),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 2 * 1024 * 1024 * 1024),
            allowed_origins: parse_origins(&env::get_or(EnvKey::AllowedOrigins, "")),
        })
    }

    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_secs(self.encoder_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// `{endpoint}/{bucket}`, the base every playback URL hangs off.
    pub fn playback_base(&self) -> String {
        format!(
            "{}/{}",
            self.s3_public_endpoint.trim_end_matches('/'),
            self.s3_bucket
        )
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
