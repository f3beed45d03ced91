use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Serialize;

use super::AppState;
use super::extract::{ApiJson, ApiPath};
use crate::records::Background;
use crate::service::{ApiError, BackgroundRequest, RegenerateRequest};

#[derive(Serialize)]
pub struct BackgroundAccepted {
    background_id: u64,
}

pub async fn create(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<BackgroundRequest>,
) -> Result<(StatusCode, Json<BackgroundAccepted>), ApiError> {
    let background = service.submit_background(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BackgroundAccepted {
            background_id: background.id,
        }),
    ))
}

pub async fn show(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<Background>, ApiError> {
    Ok(Json(service.get_background(id).await?))
}

pub async fn regenerate(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<RegenerateRequest>,
) -> Result<(StatusCode, Json<BackgroundAccepted>), ApiError> {
    let background = service.regenerate_background(id, request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(BackgroundAccepted {
            background_id: background.id,
        }),
    ))
}

pub async fn destroy(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    service.delete_background(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
