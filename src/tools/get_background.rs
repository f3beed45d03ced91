use rmcp::{
    ErrorData as McpError, handler::server::wrapper::Parameters, model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use super::{json_result, to_mcp_error};
use crate::service::MediaService;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetBackgroundRequest {
    #[schemars(description = "Background id returned by submit_background")]
    pub background_id: u64,
}

pub async fn get_background(
    service: &MediaService,
    Parameters(request): Parameters<GetBackgroundRequest>,
) -> Result<CallToolResult, McpError> {
    let background = service
        .get_background(request.background_id)
        .await
        .map_err(to_mcp_error)?;
    json_result(&background)
}
