use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::dto::JobFailure;
use super::model::Backend;
use crate::common::response::ApiResponse;
use crate::infrastructure::process::ToolError;
use crate::infrastructure::storage::StorageError;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Process(#[from] ToolError),

    #[error("master manifest not found at {0}")]
    MissingManifest(PathBuf),

    #[error("no segments were written to {0}")]
    EmptyRendition(PathBuf),

    #[error("failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk output directory: {0}")]
    Walk(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot derive a video name from '{0}'")]
    InvalidName(String),

    #[error("failed to transcode video with {backend}: {source}")]
    Encode {
        backend: Backend,
        #[source]
        source: EncodeError,
    },

    #[error("failed to publish video encoded with {backend}: {source}")]
    Publish {
        backend: Backend,
        #[source]
        source: PublishError,
    },

    #[error("transcode worker stopped: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Backend in effect when the job failed, if it got that far.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            PipelineError::Encode { backend, .. } | PipelineError::Publish { backend, .. } => {
                Some(*backend)
            }
            PipelineError::InvalidName(_) | PipelineError::Worker(_) => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::InvalidName(_) => StatusCode::BAD_REQUEST,
            PipelineError::Publish { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Encode { .. } | PipelineError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::failure(
            &self.to_string(),
            JobFailure {
                backend: self.backend(),
            },
        );
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_failure_names_the_backend() {
        let err = PipelineError::Encode {
            backend: Backend::Simple,
            source: EncodeError::MissingManifest(PathBuf::from("/out/clip/index.m3u8")),
        };
        assert_eq!(err.backend(), Some(Backend::Simple));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("failed to transcode video with simple"));
    }

    #[test]
    fn invalid_name_is_a_client_error_without_backend() {
        let err = PipelineError::InvalidName("???".to_string());
        assert_eq!(err.backend(), None);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
