use rmcp::{ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult};
use serde::Serialize;

use super::{json_result, to_mcp_error};
use crate::service::{BackgroundRequest, MediaService};
use crate::status;

#[derive(Debug, Serialize)]
struct Submitted {
    background_id: u64,
    /// Key to pass to `check_generation_status`.
    status_key: String,
}

pub async fn submit_background(
    service: &MediaService,
    Parameters(request): Parameters<BackgroundRequest>,
) -> Result<CallToolResult, McpError> {
    let background = service
        .submit_background(request)
        .await
        .map_err(to_mcp_error)?;
    json_result(&Submitted {
        background_id: background.id,
        status_key: status::background_key(background.image_id),
    })
}
