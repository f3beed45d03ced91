use axum::{Json, extract::State, http::StatusCode};

use super::AppState;
use super::extract::ApiJson;
use crate::records::User;
use crate::service::{ApiError, CreateUserRequest};

pub async fn create(
    State(service): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = service.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
