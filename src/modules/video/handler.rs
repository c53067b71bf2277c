use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};

use super::dto::{JobFailure, UploadResponse};
use super::model::{Backend, CatalogEntry, SourceAsset};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::stream_to_disk;
use crate::state::AppState;

async fn discard(source: Option<SourceAsset>) {
    if let Some(source) = source {
        let _ = tokio::fs::remove_file(&source.path).await;
    }
}

/// Upload a video and publish it as HLS
///
/// Multipart fields: `video` (the file) and `backend` (`simple` | `advanced`,
/// default `simple`). The legacy `packager` field (`ffmpeg` | `shaka`) is also
/// understood. Responds once the renditions are in object storage.
#[utoipa::path(
    post,
    path = "/api/v1/upload",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video transcoded and published", body = ApiResponse<UploadResponse>),
        (status = 400, description = "No file, bad backend or bad content type"),
        (status = 500, description = "Transcoding failed", body = ApiResponse<JobFailure>),
        (status = 502, description = "Publishing to storage failed", body = ApiResponse<JobFailure>)
    ),
    tag = "Videos"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut source: Option<SourceAsset> = None;
    let mut requested: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(source).await;
                // Carries 413 when the body limit tripped mid-stream.
                let status = e.status();
                return ApiError(format!("Malformed multipart body: {}", e.body_text()), status)
                    .into_response();
            }
        };

        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "video" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                // Browsers send an empty part when no file was picked.
                if file_name.is_empty() || source.is_some() {
                    continue;
                }

                match stream_to_disk(field, &state.config.upload_dir, &file_name).await {
                    Ok(asset) => source = Some(asset),
                    Err(e) => return ApiError(e.to_string(), e.status_code()).into_response(),
                }
            }
            "backend" | "packager" => match field.text().await {
                Ok(text) => requested = Some(text),
                Err(e) => {
                    discard(source).await;
                    return ApiError::bad_request(format!("Unreadable '{}' field: {}", name, e))
                        .into_response();
                }
            },
            _ => {}
        }
    }

    let Some(source) = source else {
        return ApiError::bad_request("No file uploaded").into_response();
    };

    let backend = match requested.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Backend::default(),
        Some(raw) => match raw.parse::<Backend>() {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Rejecting upload '{}': {}", source.original_name, e);
                discard(Some(source)).await;
                return ApiError::bad_request(e.to_string()).into_response();
            }
        },
    };

    info!("Starting transcode for '{}' with {}", source.original_name, backend);

    match state.transcoder.submit(source, backend).await {
        Ok(video) => ApiSuccess(
            ApiResponse::success(
                UploadResponse {
                    url: video.url,
                    name: video.metadata.name,
                    backend: video.metadata.backend,
                },
                "Video transcoded and published",
            ),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// List published videos
#[utoipa::path(
    get,
    path = "/api/v1/videos",
    responses(
        (status = 200, description = "Published videos", body = ApiResponse<Vec<CatalogEntry>>),
        (status = 502, description = "Object storage listing failed")
    ),
    tag = "Videos"
)]
pub async fn list_videos(State(state): State<AppState>) -> impl IntoResponse {
    match state.catalog.list().await {
        Ok(entries) => ApiSuccess(
            ApiResponse::success(entries, "Videos retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => {
            error!("Error listing videos: {}", e);
            ApiError(format!("Failed to list videos: {}", e), StatusCode::BAD_GATEWAY)
                .into_response()
        }
    }
}
