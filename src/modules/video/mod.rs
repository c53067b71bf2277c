use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

pub mod catalog;
pub mod dto;
pub mod encoder;
pub mod error;
pub mod handler;
pub mod model;
pub mod probe;
pub mod publisher;
pub mod service;
#[cfg(test)]
pub mod testing;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    let upload_routes = Router::new()
        .route("/upload", post(handler::upload_video))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes));

    Router::new()
        .route("/videos", get(handler::list_videos))
        .merge(upload_routes)
}
