use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::service::{BackgroundRequest, MediaService};
use crate::tools::{CheckGenerationStatusRequest, GetBackgroundRequest};

#[derive(Clone)]
pub struct MediaServer {
    tool_router: ToolRouter<Self>,
    service: Arc<MediaService>,
}

impl MediaServer {
    pub fn new(service: Arc<MediaService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }
}

#[tool_router]
impl MediaServer {
    #[tool(
        description = "Queue AI background generation for a source image. Returns the background id and the status key to poll; generation takes a while, so tell the user before calling."
    )]
    async fn submit_background(
        &self,
        Parameters(request): Parameters<BackgroundRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::submit_background(&self.service, Parameters(request)).await
    }

    #[tool(description = "Read a background record. image_url is set once generation finished; show it as ![](url).")]
    async fn get_background(
        &self,
        Parameters(request): Parameters<GetBackgroundRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::get_background(&self.service, Parameters(request)).await
    }

    #[tool(description = "Check the latest outcome of a generation job by status key: ready with url, failed with error, or pending.")]
    async fn check_generation_status(
        &self,
        Parameters(request): Parameters<CheckGenerationStatusRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::check_generation_status(&self.service, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for MediaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
