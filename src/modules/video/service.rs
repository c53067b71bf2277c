use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use super::encoder::EncoderSet;
use super::error::{EncodeError, PipelineError, PublishError};
use super::model::{
    ArtifactMetadata, Backend, EncodeJob, MASTER_MANIFEST, METADATA_FILE, RenditionSet,
    SourceAsset, base_name, playback_url,
};
use super::probe::{Compatibility, CompatibilityProbe};
use super::publisher::Publisher;

/// Outcome of a finished job.
#[derive(Debug, Clone)]
pub struct PublishedVideo {
    pub url: String,
    pub metadata: ArtifactMetadata,
}

/// Serializes jobs that derive the same name, so two uploads of `clip.mov`
/// never share an output directory or storage prefix at the same time.
#[derive(Clone, Default)]
pub struct NameLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl NameLocks {
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the map still references are idle.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(map.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Probe → layout → encode → verify → (fallback) → publish → metadata.
pub struct Pipeline {
    prober: Arc<dyn CompatibilityProbe>,
    encoders: EncoderSet,
    publisher: Publisher,
    output_root: PathBuf,
    playback_base: String,
    locks: NameLocks,
}

impl Pipeline {
    pub fn new(
        prober: Arc<dyn CompatibilityProbe>,
        encoders: EncoderSet,
        publisher: Publisher,
        output_root: PathBuf,
        playback_base: String,
    ) -> Self {
        Self {
            prober,
            encoders,
            publisher,
            output_root,
            playback_base,
            locks: NameLocks::default(),
        }
    }

    /// Runs one job to completion. The source file is removed afterwards
    /// whatever the outcome.
    pub async fn run(
        &self,
        source: SourceAsset,
        requested: Backend,
    ) -> Result<PublishedVideo, PipelineError> {
        let result = self.process(&source, requested).await;

        if let Err(e) = tokio::fs::remove_file(&source.path).await {
            debug!("Could not remove upload {}: {}", source.path.display(), e);
        }

        match &result {
            Ok(video) => info!(
                "✅ '{}' published with {}: {}",
                video.metadata.name, video.metadata.backend, video.url
            ),
            Err(e) => error!("❌ Job for '{}' failed: {}", source.original_name, e),
        }
        result
    }

    async fn process(
        &self,
        source: &SourceAsset,
        requested: Backend,
    ) -> Result<PublishedVideo, PipelineError> {
        let name = base_name(&source.original_name)
            .ok_or_else(|| PipelineError::InvalidName(source.original_name.clone()))?;

        let _guard = self.locks.lock(&name).await;

        let backend = self.select_backend(&source.path, requested).await;
        let output_dir = self.output_root.join(&name);
        let job = EncodeJob {
            source: source.path.clone(),
            name: name.clone(),
            backend,
            output_dir: output_dir.clone(),
        };

        let backend = self.encode_with_fallback(job).await?;
        let metadata = ArtifactMetadata {
            name: name.clone(),
            backend,
            created_at: OffsetDateTime::now_utc(),
            source: source.original_name.clone(),
        };

        self.publish(&output_dir, &metadata)
            .await
            .map_err(|source| PipelineError::Publish { backend, source })?;

        Ok(PublishedVideo {
            url: playback_url(&self.playback_base, &name),
            metadata,
        })
    }

    async fn select_backend(&self, path: &Path, requested: Backend) -> Backend {
        if requested != Backend::Advanced {
            return requested;
        }

        match self.prober.check(path).await {
            Compatibility::Compatible => requested,
            Compatibility::Incompatible { reason } => {
                warn!(
                    "Source {} not compatible with {} backend ({}), using {}",
                    path.display(),
                    requested,
                    reason,
                    Backend::Simple
                );
                Backend::Simple
            }
        }
    }

    /// At most one fallback: advanced → simple. The simple backend is the floor.
    async fn encode_with_fallback(&self, mut job: EncodeJob) -> Result<Backend, PipelineError> {
        let mut fell_back = false;

        loop {
            match self.attempt(&job).await {
                Ok(set) => {
                    info!(
                        "Encoded '{}' with {}: {} files, {} bytes",
                        job.name,
                        job.backend,
                        set.files.len(),
                        set.total_bytes()
                    );
                    for file in &set.files {
                        debug!("  {} ({} bytes)", file.relative, file.size);
                    }
                    return Ok(job.backend);
                }
                Err(err) => match job.backend.fallback() {
                    Some(next) if !fell_back => {
                        warn!(
                            "Encoding '{}' with {} failed ({}), falling back to {}",
                            job.name, job.backend, err, next
                        );
                        fell_back = true;
                        job.backend = next;
                    }
                    _ => {
                        return Err(PipelineError::Encode {
                            backend: job.backend,
                            source: err,
                        });
                    }
                },
            }
        }
    }

    async fn attempt(&self, job: &EncodeJob) -> Result<RenditionSet, EncodeError> {
        prepare_output_dir(&job.output_dir, job.backend).await?;
        let set = self.encoders.for_backend(job.backend).encode(job).await?;
        verify(&set, job)?;
        Ok(set)
    }

    async fn publish(
        &self,
        output_dir: &Path,
        metadata: &ArtifactMetadata,
    ) -> Result<(), PublishError> {
        self.publisher.replace_dir(output_dir, &metadata.name).await?;

        let local = output_dir.join(METADATA_FILE);
        let body = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(&local, body)
            .await
            .map_err(|source| PublishError::Write {
                path: local.clone(),
                source,
            })?;

        self.publisher.publish_metadata(metadata).await
    }
}

/// Starts every attempt from an empty directory, so a failed advanced run
/// cannot leave stale renditions behind for the fallback to publish.
async fn prepare_output_dir(dir: &Path, backend: Backend) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await?;
    for sub in backend.rendition_dirs() {
        tokio::fs::create_dir_all(dir.join(sub)).await?;
    }
    Ok(())
}

/// A zero exit is not enough: the master manifest must exist and, for the
/// advanced backend, the primary rendition must hold files.
fn verify(set: &RenditionSet, job: &EncodeJob) -> Result<(), EncodeError> {
    if !set.contains(MASTER_MANIFEST) {
        return Err(EncodeError::MissingManifest(job.master_manifest()));
    }
    if let Some(primary) = job.backend.primary_rendition() {
        if set.files_under(primary) == 0 {
            return Err(EncodeError::EmptyRendition(job.output_dir.join(primary)));
        }
    }
    Ok(())
}
