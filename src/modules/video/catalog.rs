use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::debug;

use super::model::{ArtifactMetadata, CatalogEntry, METADATA_FILE, playback_url};
use crate::infrastructure::storage::{ObjectStore, StorageError};

// Metadata reads in flight during one listing.
const METADATA_FETCH_CONCURRENCY: usize = 8;

/// Read side: what has been published, and how.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ObjectStore>,
    playback_base: String,
}

impl Catalog {
    pub fn new(store: Arc<dyn ObjectStore>, playback_base: String) -> Self {
        Self {
            store,
            playback_base,
        }
    }

    /// Lists every top-level prefix in the bucket. A listing failure is an
    /// error; a missing or broken metadata record only leaves the optional
    /// fields empty.
    pub async fn list(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let names = self.store.list_prefixes().await?;
        let entries = stream::iter(names)
            .map(|name| self.entry(name))
            .buffered(METADATA_FETCH_CONCURRENCY)
            .collect()
            .await;
        Ok(entries)
    }

    async fn entry(&self, name: String) -> CatalogEntry {
        let mut entry = CatalogEntry {
            url: playback_url(&self.playback_base, &name),
            name,
            backend: None,
            created_at: None,
        };

        if let Some(meta) = self.metadata(&entry.name).await {
            entry.backend = Some(meta.backend);
            entry.created_at = Some(meta.created_at);
        }
        entry
    }

    pub async fn metadata(&self, name: &str) -> Option<ArtifactMetadata> {
        let key = format!("{}/{}", name, METADATA_FILE);

        let body = match self.store.get_object(&key).await {
            Ok(body) => body,
            Err(e) => {
                debug!("No metadata found for {}: {}", name, e);
                return None;
            }
        };

        match serde_json::from_slice::<ArtifactMetadata>(&body) {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!("Ignoring malformed metadata for {}: {}", name, e);
                None
            }
        }
    }
}
