//! REST surface. Handlers translate HTTP to [`MediaService`] calls and back;
//! every error, extractor rejections included, leaves as
//! `{ "error": message }`.

mod backgrounds;
mod extract;
mod images;
mod resizings;
mod status;
mod users;
mod videos;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::service::{ApiError, MediaService};

pub type AppState = Arc<MediaService>;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        json_error(status, &self.to_string())
    }
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/users", post(users::create))
        .route(
            "/api/v1/images",
            post(images::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/images/register", post(images::register))
        .route("/api/v1/images/{id}", get(images::show))
        .route("/api/v1/backgrounds", post(backgrounds::create))
        .route(
            "/api/v1/backgrounds/{id}",
            get(backgrounds::show)
                .put(backgrounds::regenerate)
                .delete(backgrounds::destroy),
        )
        .route("/api/v1/videos", post(videos::create))
        .route(
            "/api/v1/videos/{id}",
            get(videos::show).delete(videos::destroy),
        )
        .route("/api/v1/text-videos", post(videos::create_from_text))
        .route(
            "/api/v1/text-videos/{id}",
            get(videos::show_text).delete(videos::destroy_text),
        )
        .route("/api/v1/image-resizings", post(resizings::create))
        .route(
            "/api/v1/image-resizings/{id}",
            get(resizings::show).delete(resizings::destroy),
        )
        .route("/api/v1/status/{key}", get(status::show))
        .with_state(service)
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::jobs::testing::{Clients, Harness};
    use crate::jobs::{JobQueue, QueueError};
    use crate::storage::StorageError;
    use crate::testing::spawn_server;

    async fn serve_api(harness: &Harness) -> String {
        let (queue, _jobs) = JobQueue::detached(4);
        let service = MediaService::new(Arc::new(harness.pipeline(Clients::default())), queue);
        spawn_server(router(Arc::new(service))).await
    }

    async fn error_body(response: reqwest::Response) -> String {
        let body: Value = response.json().await.unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn mistyped_json_body_is_a_json_400() {
        let harness = Harness::new().await;
        let base = serve_api(&harness).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/v1/backgrounds"))
            .json(&json!({ "user_id": 1, "image_id": 1, "gen_type": "simple", "output_w": -1 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(error_body(response).await.contains("output_w"));
    }

    #[tokio::test]
    async fn malformed_path_and_missing_form_are_json_400s() {
        let harness = Harness::new().await;
        let base = serve_api(&harness).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/api/v1/backgrounds/latest"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(!error_body(response).await.is_empty());

        let response = client
            .post(format!("{base}/api/v1/images"))
            .body("not a form")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(!error_body(response).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_record_is_a_json_404() {
        let harness = Harness::new().await;
        let base = serve_api(&harness).await;

        let response = reqwest::get(format!("{base}/api/v1/backgrounds/7"))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(error_body(response).await, "backgrounds 7 not found");
    }

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (ApiError::BadRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (
                ApiError::NotFound {
                    entity: "backgrounds",
                    id: 3,
                },
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Conflict("busy".to_string()), StatusCode::CONFLICT),
            (
                ApiError::Storage(StorageError::InvalidKey("../x".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Unavailable(QueueError::Full),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
