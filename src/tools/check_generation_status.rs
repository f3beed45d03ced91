use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::service::MediaService;
use crate::status::StatusEntry;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckGenerationStatusRequest {
    #[schemars(
        description = "Status key, e.g. background_image_url_{image_id}, video_url_{background_id}, text_video_url_{text_video_id}, resized_image_url_{background_id}"
    )]
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StatusReport {
    Known(StatusEntry),
    Pending { status: &'static str },
}

/// No entry means the job is queued, still running, or its entry expired.
pub async fn check_generation_status(
    service: &MediaService,
    Parameters(request): Parameters<CheckGenerationStatusRequest>,
) -> Result<CallToolResult, McpError> {
    let report = match service.status(request.key.trim()).await {
        Some(entry) => StatusReport::Known(entry),
        None => StatusReport::Pending { status: "pending" },
    };
    json_result(&report)
}
