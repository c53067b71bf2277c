use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::storage::ObjectStore;
use infrastructure::storage::s3::StorageService;
use modules::video::catalog::Catalog;
use modules::video::encoder::{EncoderSet, FfmpegEncoder, ShakaPackagerEncoder};
use modules::video::probe::FfprobeProber;
use modules::video::publisher::Publisher;
use modules::video::service::Pipeline;
use state::AppState;
use workers::transcoder::TranscodeWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new().context("failed to load configuration")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    for (tool, path) in [
        ("ffmpeg", &config.ffmpeg_path),
        ("ffprobe", &config.ffprobe_path),
        ("packager", &config.packager_path),
    ] {
        match which::which(path) {
            Ok(found) => info!("🔧 {} found at {}", tool, found.display()),
            Err(_) => warn!(
                "⚠️ {} not found at '{}', jobs using it will fail",
                tool,
                path.display()
            ),
        }
    }

    let storage = StorageService::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_bucket,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .await;

    if let Err(e) = storage.ensure_bucket().await {
        warn!("⚠️ Could not verify bucket '{}': {}", config.s3_bucket, e);
    }

    let store: Arc<dyn ObjectStore> = Arc::new(storage);
    let playback_base = config.playback_base();

    let encoders = EncoderSet::new(
        Arc::new(FfmpegEncoder::new(config.ffmpeg_path.clone(), config.encoder_timeout())),
        Arc::new(ShakaPackagerEncoder::new(config.packager_path.clone(), config.encoder_timeout())),
    );

    let pipeline = Pipeline::new(
        Arc::new(FfprobeProber::new(config.ffprobe_path.clone(), config.probe_timeout())),
        encoders,
        Publisher::new(store.clone(), config.upload_concurrency),
        config.output_dir.clone(),
        playback_base.clone(),
    );

    let transcoder = TranscodeWorker::new(Arc::new(pipeline), config.max_concurrent_jobs);
    let catalog = Catalog::new(store, playback_base);

    let port = config.server_port;
    let state = AppState::new(config, catalog, transcoder);
    let app = app::create_app(state).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
