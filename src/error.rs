use thiserror::Error;

use crate::storage::StorageError;

/// Failure of one pipeline attempt. Jobs never propagate these past their own
/// boundary; they are logged, published to the status channel, and returned
/// inside the job outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("{service} request failed ({}): {body}", status_label(.status))]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        body: String,
    },

    #[error("decode media failed: {0}")]
    Decode(String),

    #[error("{url} still unavailable after {attempts} attempts")]
    AvailabilityTimeout { url: String, attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "transport".to_string(),
    }
}

impl PipelineError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Transport-level failure talking to `service`, before any status was read.
    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        Self::Upstream {
            service,
            status: None,
            body: err.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Upstream { .. } => "upstream_failure",
            Self::Decode(_) => "decode_failure",
            Self::AvailabilityTimeout { .. } => "availability_timeout",
            Self::Storage(_) => "storage_failure",
        }
    }
}

/// Reads the body of a non-2xx response into an upstream error.
pub async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::Upstream {
        service,
        status: Some(status.as_u16()),
        body,
    })
}
