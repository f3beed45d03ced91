use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::extract::ApiPath;
use super::{AppState, json_error};

/// Latest outcome published under `key`, e.g. `background_image_url_12`.
pub async fn show(State(service): State<AppState>, ApiPath(key): ApiPath<String>) -> Response {
    match service.status(&key).await {
        Some(entry) => Json(entry).into_response(),
        None => json_error(StatusCode::NOT_FOUND, &format!("no status for {key}")),
    }
}
