use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};

use super::AppState;
use super::extract::{ApiJson, ApiPath};
use crate::records::SourceImage;
use crate::service::{ApiError, RegisterImageRequest, Upload};

/// Multipart form with a `file` part and a `user_id` field.
pub async fn upload(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<SourceImage>), ApiError> {
    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let mut user_id = None;
    let mut content_type = None;
    let mut bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("failed to read form: {err}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(format!("failed to read file: {err}")))?;
                bytes = Some(data.to_vec());
            }
            Some("user_id") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(format!("failed to read user_id: {err}")))?;
                let parsed = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ApiError::BadRequest("user_id must be a number".to_string()))?;
                user_id = Some(parsed);
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| ApiError::BadRequest("missing user_id".to_string()))?;
    let bytes = bytes.ok_or_else(|| ApiError::BadRequest("missing file".to_string()))?;
    let image = service
        .upload_image(Upload {
            user_id,
            content_type,
            bytes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn register(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<RegisterImageRequest>,
) -> Result<(StatusCode, Json<SourceImage>), ApiError> {
    let image = service.register_image(request).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn show(
    State(service): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<SourceImage>, ApiError> {
    Ok(Json(service.get_image(id).await?))
}
