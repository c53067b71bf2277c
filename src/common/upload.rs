use std::path::Path;

use axum::extract::multipart::Field;
use axum::http::StatusCode;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use crate::modules::video::model::SourceAsset;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid content type '{0}': only video/* uploads are accepted")]
    InvalidContentType(String),

    #[error("Upload exceeds the size limit: {0}")]
    TooLarge(String),

    #[error("Upload stream interrupted: {0}")]
    Interrupted(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::InvalidContentType(_) | UploadError::Interrupted(_) => {
                StatusCode::BAD_REQUEST
            }
            UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn accepts(content_type: &str) -> bool {
    content_type.starts_with("video/") || content_type == mime::APPLICATION_OCTET_STREAM.as_ref()
}

/// Streams a multipart file field into `dir` under a unique name, so
/// concurrent uploads of the same file never clobber each other on disk.
pub async fn stream_to_disk(
    mut field: Field<'_>,
    dir: &Path,
    original_name: &str,
) -> Result<SourceAsset, UploadError> {
    let content_type = field
        .content_type()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
        .to_string();

    if !accepts(&content_type) {
        return Err(UploadError::InvalidContentType(content_type));
    }

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.upload", Uuid::new_v4()));
    let mut file = File::create(&path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                error!("Stream error: {}", e);
                discard(&path).await;
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    return Err(UploadError::TooLarge(e.body_text()));
                }
                return Err(UploadError::Interrupted(e.body_text()));
            }
        };

        if let Err(e) = file.write_all(&chunk).await {
            error!("Write error: {}", e);
            discard(&path).await;
            return Err(e.into());
        }
        written += chunk.len() as u64;
    }

    if let Err(e) = file.flush().await {
        discard(&path).await;
        return Err(e.into());
    }

    info!("⬆️ Received '{}' ({} bytes)", original_name, written);

    Ok(SourceAsset {
        path,
        original_name: original_name.to_string(),
    })
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}
