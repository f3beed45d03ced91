pub mod check_generation_status;
pub mod get_background;
pub mod submit_background;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::service::ApiError;

pub use check_generation_status::{CheckGenerationStatusRequest, check_generation_status};
pub use get_background::{GetBackgroundRequest, get_background};
pub use submit_background::submit_background;

/// Rejections the caller can fix become invalid-params errors; the rest are
/// internal errors.
fn to_mcp_error(err: ApiError) -> McpError {
    match err {
        ApiError::BadRequest(_) | ApiError::NotFound { .. } | ApiError::Conflict(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string(value).map_err(|err| {
        McpError::internal_error(
            "serialize result failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
