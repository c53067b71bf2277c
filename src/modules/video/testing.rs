//! Fakes for exercising the pipeline without ffmpeg, packager or S3.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use super::encoder::{Encoder, EncoderSet};
use super::error::EncodeError;
use super::model::{
    ArtifactMetadata, Backend, DASH_MANIFEST, EncodeJob, MASTER_MANIFEST, RenditionSet,
    SourceAsset,
};
use super::probe::{Compatibility, CompatibilityProbe};
use super::publisher::Publisher;
use super::service::Pipeline;
use crate::infrastructure::process::ToolError;
use crate::infrastructure::storage::memory::MemoryStore;

pub const PLAYBACK_BASE: &str = "http://localhost:9000/my-bucket";

pub struct FakeProber {
    verdict: Compatibility,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompatibilityProbe for FakeProber {
    async fn check(&self, _path: &Path) -> Compatibility {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Succeed,
    /// The process itself fails.
    Fail,
    /// Exit 0, master manifest written, primary rendition left empty.
    EmptyPrimary,
    /// Exit 0, segments written, no master manifest.
    NoManifest,
}

pub struct ScriptedEncoder {
    backend: Backend,
    outcome: Outcome,
    pub calls: AtomicUsize,
}

impl ScriptedEncoder {
    fn write(path: PathBuf, body: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)
    }

    fn write_full(&self, out: &Path) -> io::Result<()> {
        Self::write(out.join(MASTER_MANIFEST), b"#EXTM3U\n")?;
        match self.backend {
            Backend::Simple => {
                Self::write(out.join("index0.ts"), b"segment-0")?;
                Self::write(out.join("index1.ts"), b"segment-1")?;
            }
            Backend::Advanced => {
                Self::write(out.join(DASH_MANIFEST), b"<MPD/>")?;
                for dir in Backend::Advanced.rendition_dirs() {
                    Self::write(out.join(dir).join("main.m3u8"), b"#EXTM3U\n")?;
                    Self::write(out.join(dir).join("0.ts"), b"segment-0")?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn encode(&self, job: &EncodeJob) -> Result<RenditionSet, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = &job.output_dir;

        match self.outcome {
            Outcome::Fail => {
                return Err(EncodeError::Process(ToolError::Spawn {
                    tool: format!("fake-{}", self.backend),
                    source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
                }));
            }
            Outcome::Succeed => self.write_full(out)?,
            Outcome::EmptyPrimary => {
                Self::write(out.join(MASTER_MANIFEST), b"#EXTM3U\n")?;
                Self::write(out.join("audio").join("main.m3u8"), b"#EXTM3U\n")?;
                Self::write(out.join("audio").join("0.ts"), b"segment-0")?;
            }
            Outcome::NoManifest => Self::write(out.join("index0.ts"), b"segment-0")?,
        }

        Ok(RenditionSet::scan(out)?)
    }
}

/// A pipeline wired to fakes and an in-memory bucket, rooted in a temp dir.
pub struct Harness {
    tmp: TempDir,
    pub store: Arc<MemoryStore>,
    pub prober: Arc<FakeProber>,
    pub simple: Arc<ScriptedEncoder>,
    pub advanced: Arc<ScriptedEncoder>,
    pub pipeline: Arc<Pipeline>,
}

impl Harness {
    pub fn new(verdict: Compatibility, advanced: Outcome, simple: Outcome) -> Self {
        Self::with_store(MemoryStore::new(), verdict, advanced, simple)
    }

    pub fn with_store(
        store: MemoryStore,
        verdict: Compatibility,
        advanced: Outcome,
        simple: Outcome,
    ) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(store);
        let prober = Arc::new(FakeProber {
            verdict,
            calls: AtomicUsize::new(0),
        });
        let simple = Arc::new(ScriptedEncoder {
            backend: Backend::Simple,
            outcome: simple,
            calls: AtomicUsize::new(0),
        });
        let advanced = Arc::new(ScriptedEncoder {
            backend: Backend::Advanced,
            outcome: advanced,
            calls: AtomicUsize::new(0),
        });

        let pipeline = Pipeline::new(
            prober.clone(),
            EncoderSet::new(simple.clone(), advanced.clone()),
            Publisher::new(store.clone(), 4),
            tmp.path().join("videos"),
            PLAYBACK_BASE.to_string(),
        );

        Self {
            tmp,
            store,
            prober,
            simple,
            advanced,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.tmp.path().join("uploads")
    }

    pub fn output_root(&self) -> PathBuf {
        self.tmp.path().join("videos")
    }

    /// Drops a fake upload on disk, as intake would.
    pub fn source(&self, original_name: &str) -> SourceAsset {
        let dir = self.upload_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.upload", Uuid::new_v4()));
        fs::write(&path, b"not really a video").unwrap();
        SourceAsset {
            path,
            original_name: original_name.to_string(),
        }
    }

    pub fn stored_metadata(&self, name: &str) -> Option<ArtifactMetadata> {
        self.store
            .object(&format!("{name}/metadata.json"))
            .map(|o| serde_json::from_slice(&o.body).unwrap())
    }
}
