//! Image-to-video and text-to-video generations.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;

use super::AppState;
use super::extract::{ApiJson, ApiPath};
use crate::records::{TextVideo, Video};
use crate::service::{ApiError, TextVideoRequest, VideoRequest};

#[derive(Serialize)]
pub struct VideoAccepted {
    video_id: u64,
}

#[derive(Serialize)]
pub struct TextVideoAccepted {
    text_video_id: u64,
}

pub async fn create(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<VideoRequest>,
) -> Result<(StatusCode, Json<VideoAccepted>), ApiError> {
    let video = service.submit_video(request).await?;
    Ok((StatusCode::ACCEPTED, Json(VideoAccepted { video_id: video.id })))
}

pub async fn show(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Video>, ApiError> {
    Ok(Json(service.get_video(id).await?))
}

pub async fn destroy(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    service.delete_video(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_from_text(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<TextVideoRequest>,
) -> Result<(StatusCode, Json<TextVideoAccepted>), ApiError> {
    let text_video = service.submit_text_video(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(TextVideoAccepted {
            text_video_id: text_video.id,
        }),
    ))
}

pub async fn show_text(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<TextVideo>, ApiError> {
    Ok(Json(service.get_text_video(id).await?))
}

pub async fn destroy_text(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    service.delete_text_video(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
