use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;

use super::AppState;
use super::extract::{ApiJson, ApiPath};
use crate::records::ImageResizing;
use crate::service::{ApiError, ResizeRequest};

#[derive(Serialize)]
pub struct ResizeAccepted {
    resizing_id: u64,
}

pub async fn create(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<ResizeRequest>,
) -> Result<(StatusCode, Json<ResizeAccepted>), ApiError> {
    let resizing = service.submit_resize(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ResizeAccepted {
            resizing_id: resizing.id,
        }),
    ))
}

pub async fn show(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<ImageResizing>, ApiError> {
    Ok(Json(service.get_resize(id).await?))
}

pub async fn destroy(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    service.delete_resize(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
