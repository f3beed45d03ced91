//! Clients for the third-party services a job talks to.

pub mod draph;
pub mod fal;
pub mod fetch;
pub mod runway;
pub mod translate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::records::GenType;

pub use draph::DraphClient;
pub use fal::FalClient;
pub use fetch::{HttpFetcher, MediaFetcher};
pub use runway::RunwayClient;
pub use translate::{OpenAiTranslator, Translator, is_korean};

#[cfg(test)]
pub use translate::MockTranslator;

/// What a job asks a generation service to produce.
#[derive(Debug, Clone)]
pub enum GenerationInput {
    Background {
        image: Vec<u8>,
        gen_type: GenType,
        output_w: u32,
        output_h: u32,
        concept_option: String,
    },
    ImageToVideo {
        image_url: String,
    },
    TextToVideo {
        prompt: String,
    },
}

impl GenerationInput {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Background { .. } => "background",
            Self::ImageToVideo { .. } => "image_to_video",
            Self::TextToVideo { .. } => "text_to_video",
        }
    }
}

/// Opaque reference to a long-running remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
}

/// What a generation service handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    /// Encoded media in the response body (typically base64 text).
    Inline(Vec<u8>),
    /// The finished artifact is downloadable here.
    ResultUrl(String),
    /// The service queued the work; poll with [`GenerationClient::job_status`].
    Handle(JobHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobState {
    Pending { status: String },
    Completed { url: String },
    Failed { reason: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn service(&self) -> &'static str;

    async fn generate(&self, input: &GenerationInput) -> Result<GenerationOutput, PipelineError>;

    /// Current state of a job previously returned as [`GenerationOutput::Handle`].
    async fn job_status(&self, handle: &JobHandle) -> Result<RemoteJobState, PipelineError> {
        Err(PipelineError::Upstream {
            service: self.service(),
            status: None,
            body: format!("job handle {} is not pollable", handle.request_id),
        })
    }
}

pub(crate) fn unsupported_input(service: &'static str, input: &GenerationInput) -> PipelineError {
    PipelineError::Upstream {
        service,
        status: None,
        body: format!("{} input is not supported", input.label()),
    }
}
