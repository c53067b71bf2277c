use utoipa::OpenApi;
use crate::modules::video::dto::*;
use crate::modules::video::model::{ArtifactMetadata, Backend, CatalogEntry};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::list_videos,
    ),
    components(
        schemas(UploadResponse, JobFailure, CatalogEntry, Backend, ArtifactMetadata)
    ),
    tags(
        (name = "Videos", description = "Upload, transcode and list HLS videos")
    )
)]
pub struct ApiDoc;
