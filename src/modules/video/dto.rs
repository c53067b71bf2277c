use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::Backend;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// Playback URL of the master manifest.
    pub url: String,
    pub name: String,
    /// Backend that actually produced the renditions (after any fallback).
    pub backend: Backend,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
}
