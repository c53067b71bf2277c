use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use crate::modules::video::error::PipelineError;
use crate::modules::video::model::{Backend, SourceAsset};
use crate::modules::video::service::{Pipeline, PublishedVideo};

/// Runs each transcode job on its own task, with at most
/// `max_concurrent_jobs` encoders alive at once.
#[derive(Clone)]
pub struct TranscodeWorker {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
}

impl TranscodeWorker {
    pub fn new(pipeline: Arc<Pipeline>, max_concurrent_jobs: usize) -> Self {
        info!("🎥 Transcoder ready ({} concurrent jobs)", max_concurrent_jobs.max(1));
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Queues the job and waits for its result. The job runs detached, so it
    /// still finishes (and cleans up) if the caller goes away.
    pub async fn submit(
        &self,
        source: SourceAsset,
        backend: Backend,
    ) -> Result<PublishedVideo, PipelineError> {
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);

        info!("📦 Queued '{}' (requested backend: {})", source.original_name, backend);

        let handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Worker(e.to_string()))?;
            pipeline.run(source, backend).await
        });

        handle
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }
}
