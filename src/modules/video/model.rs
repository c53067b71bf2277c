use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use walkdir::WalkDir;

pub const MASTER_MANIFEST: &str = "index.m3u8";
pub const DASH_MANIFEST: &str = "manifest.mpd";
pub const METADATA_FILE: &str = "metadata.json";

pub const AUDIO_RENDITION: &str = "audio";

/// One rung of the advanced backend's video ladder.
#[derive(Debug, Clone, Copy)]
pub struct VideoRung {
    pub dir: &'static str,
    pub width: u32,
    pub height: u32,
    pub bitrate: u32,
}

pub const VIDEO_LADDER: [VideoRung; 3] = [
    VideoRung { dir: "video_low", width: 640, height: 360, bitrate: 800_000 },
    VideoRung { dir: "video_med", width: 854, height: 480, bitrate: 1_500_000 },
    VideoRung { dir: "video_high", width: 1280, height: 720, bitrate: 3_000_000 },
];

const ADVANCED_DIRS: [&str; 4] = [AUDIO_RENDITION, "video_low", "video_med", "video_high"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single-bitrate HLS through ffmpeg.
    #[default]
    #[serde(alias = "ffmpeg")]
    Simple,
    /// Multi-bitrate HLS + DASH through Shaka Packager.
    #[serde(alias = "shaka")]
    Advanced,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Simple => "simple",
            Backend::Advanced => "advanced",
        }
    }

    /// The backend to retry with when this one fails. `None` is the floor.
    pub fn fallback(self) -> Option<Backend> {
        match self {
            Backend::Advanced => Some(Backend::Simple),
            Backend::Simple => None,
        }
    }

    pub fn rendition_dirs(self) -> &'static [&'static str] {
        match self {
            Backend::Simple => &[],
            Backend::Advanced => &ADVANCED_DIRS,
        }
    }

    /// Directory that must hold output for the encode to count as complete.
    pub fn primary_rendition(self) -> Option<&'static str> {
        match self {
            Backend::Simple => None,
            Backend::Advanced => Some(VIDEO_LADDER[0].dir),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown backend '{}', expected 'simple' or 'advanced'", self.0)
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "ffmpeg" => Ok(Backend::Simple),
            "advanced" | "shaka" => Ok(Backend::Advanced),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// An uploaded file waiting to be transcoded.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub original_name: String,
}

#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub source: PathBuf,
    pub name: String,
    pub backend: Backend,
    pub output_dir: PathBuf,
}

impl EncodeJob {
    pub fn master_manifest(&self) -> PathBuf {
        self.output_dir.join(MASTER_MANIFEST)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionFile {
    /// Path relative to the rendition root, `/`-separated.
    pub relative: String,
    pub size: u64,
}

/// Files an encoder left under a job's output directory.
#[derive(Debug, Clone)]
pub struct RenditionSet {
    pub root: PathBuf,
    pub files: Vec<RenditionFile>,
}

impl RenditionSet {
    pub fn scan(root: &Path) -> io::Result<Self> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(io::Error::other)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size = entry.metadata().map_err(io::Error::other)?.len();
            files.push(RenditionFile { relative, size });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.files.iter().any(|f| f.relative == relative)
    }

    pub fn files_under(&self, dir: &str) -> usize {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files.iter().filter(|f| f.relative.starts_with(&prefix)).count()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Durable record of a finished job, stored as `{name}/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub name: String,
    #[serde(alias = "packager")]
    pub backend: Backend,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<OffsetDateTime>,
}

/// `{base}/{name}/index.m3u8` where `base` is `{endpoint}/{bucket}`.
pub fn playback_url(base: &str, name: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), name, MASTER_MANIFEST)
}

/// Derives the job name from an uploaded file name: the stem, with anything
/// that is not safe in both a path segment and an object key replaced by `_`.
pub fn base_name(original: &str) -> Option<String> {
    let file = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(original);
    let stem = match file.rfind('.') {
        Some(0) | None => file,
        Some(idx) => &file[..idx],
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }
    Some(cleaned.to_string())
}
