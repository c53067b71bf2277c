use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{TryStreamExt, stream};
use tracing::{debug, info};

use super::error::PublishError;
use super::model::{ArtifactMetadata, METADATA_FILE, RenditionSet};
use crate::infrastructure::storage::ObjectStore;

const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for a produced file, keyed on its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "m3u8" => "application/vnd.apple.mpegurl",
        "ts" => "video/MP2T",
        "m4s" => "video/iso.segment",
        "mp4" => "video/mp4",
        "mpd" => "application/dash+xml",
        "vtt" => "text/vtt",
        _ => OCTET_STREAM,
    }
}

/// Uploads rendition trees and metadata records to the object store.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Uploads every file under `dir` as `{prefix}/{relative path}`.
    ///
    /// Uploads run concurrently with no ordering between files. The first
    /// failure cancels the uploads still in flight and is returned.
    pub async fn publish_dir(&self, dir: &Path, prefix: &str) -> Result<usize, PublishError> {
        let set = scan(dir).await?;
        self.publish_set(&set, prefix).await
    }

    /// Publishes `dir` under `prefix`, then removes whatever an earlier job
    /// left there that this one did not produce. The metadata record stays;
    /// the caller rewrites it.
    pub async fn replace_dir(&self, dir: &Path, prefix: &str) -> Result<usize, PublishError> {
        let set = scan(dir).await?;
        let count = self.publish_set(&set, prefix).await?;
        self.prune(&set, prefix).await?;
        Ok(count)
    }

    /// Deletes every key under `{prefix}/` that is neither in `set` nor the
    /// metadata record. Returns how many were removed.
    pub async fn prune(&self, set: &RenditionSet, prefix: &str) -> Result<usize, PublishError> {
        let prefix = prefix.trim_end_matches('/');
        let keep: HashSet<String> = set
            .files
            .iter()
            .map(|f| format!("{}/{}", prefix, f.relative))
            .chain(std::iter::once(format!("{}/{}", prefix, METADATA_FILE)))
            .collect();

        let stale: Vec<String> = self
            .store
            .list_keys(&format!("{}/", prefix))
            .await?
            .into_iter()
            .filter(|key| !keep.contains(key))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        for key in &stale {
            debug!("Removing stale object: {}", key);
        }
        self.store.delete_objects(&stale).await?;

        info!(
            "Removed {} stale objects from {}/{}/",
            stale.len(),
            self.store.bucket(),
            prefix
        );
        Ok(stale.len())
    }

    pub async fn publish_set(
        &self,
        set: &RenditionSet,
        prefix: &str,
    ) -> Result<usize, PublishError> {
        let prefix = prefix.trim_end_matches('/');
        let count = set.files.len();

        stream::iter(set.files.iter().map(Ok::<_, PublishError>))
            .try_for_each_concurrent(self.concurrency, |file| {
                let store = Arc::clone(&self.store);
                let path = set.root.join(&file.relative);
                let key = format!("{}/{}", prefix, file.relative);
                async move {
                    let data = tokio::fs::read(&path)
                        .await
                        .map_err(|source| PublishError::Read {
                            path: path.clone(),
                            source,
                        })?;
                    let content_type = content_type_for(&path);
                    store.put_object(&key, Bytes::from(data), content_type).await?;
                    debug!("Uploaded: {} ({})", key, content_type);
                    Ok(())
                }
            })
            .await?;

        info!("Uploaded {} files to {}/{}/", count, self.store.bucket(), prefix);
        Ok(count)
    }

    pub async fn publish_metadata(&self, metadata: &ArtifactMetadata) -> Result<(), PublishError> {
        let body = serde_json::to_vec_pretty(metadata)?;
        let key = format!("{}/{}", metadata.name, METADATA_FILE);

        self.store
            .put_object(&key, Bytes::from(body), mime::APPLICATION_JSON.as_ref())
            .await?;

        info!("Uploaded metadata: {}", key);
        Ok(())
    }
}

async fn scan(dir: &Path) -> Result<RenditionSet, PublishError> {
    let root = dir.to_path_buf();
    let set = tokio::task::spawn_blocking(move || RenditionSet::scan(&root))
        .await
        .map_err(std::io::Error::other)??;
    Ok(set)
}
