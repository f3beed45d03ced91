use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    GenerationClient, GenerationInput, GenerationOutput, JobHandle, RemoteJobState,
    unsupported_input,
};
use crate::config::FalConfig;
use crate::error::{PipelineError, ensure_success};

const SERVICE: &str = "fal";
const TEXT_TO_VIDEO_MODEL: &str = "fal-ai/fast-svd/text-to-video";
const NEGATIVE_PROMPT: &str = "unrealistic, saturated, high contrast, big nose, painting, drawing, sketch, cartoon, anime, manga, render, CG, 3d, watermark, signature, label";

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoResult {
    video: Option<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: String,
}

/// Queue-based text-to-video API: submission returns a handle that is polled
/// until the job completes.
#[derive(Clone)]
pub struct FalClient {
    client: Client,
    config: FalConfig,
}

impl FalClient {
    pub fn new(config: FalConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn authorization(&self) -> String {
        format!("Key {}", self.config.api_key)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PipelineError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let text = response
            .text()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        serde_json::from_str(&text).map_err(|err| PipelineError::Upstream {
            service: SERVICE,
            status: None,
            body: format!("unreadable response ({err}): {text}"),
        })
    }
}

#[async_trait]
impl GenerationClient for FalClient {
    fn service(&self) -> &'static str {
        SERVICE
    }

    async fn generate(&self, input: &GenerationInput) -> Result<GenerationOutput, PipelineError> {
        let GenerationInput::TextToVideo { prompt } = input else {
            return Err(unsupported_input(SERVICE, input));
        };

        let base = self.config.queue_url.trim_end_matches('/');
        let submit_url = format!("{base}/{TEXT_TO_VIDEO_MODEL}");
        let response = self
            .client
            .post(&submit_url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&json!({
                "prompt": prompt,
                "motion_bucket_id": 127,
                "cond_aug": 0.02,
                "steps": 20,
                "deep_cache": "none",
                "fps": 10,
                "negative_prompt": NEGATIVE_PROMPT,
                "video_size": "landscape_16_9",
            }))
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let submitted: SubmitResponse =
            response.json().await.map_err(|err| PipelineError::transport(SERVICE, err))?;

        let request_base = format!("{base}/{TEXT_TO_VIDEO_MODEL}/requests/{}", submitted.request_id);
        let handle = JobHandle {
            status_url: submitted
                .status_url
                .unwrap_or_else(|| format!("{request_base}/status")),
            response_url: submitted.response_url.unwrap_or(request_base),
            request_id: submitted.request_id,
        };
        tracing::info!(request_id = %handle.request_id, "text-to-video job queued");
        Ok(GenerationOutput::Handle(handle))
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<RemoteJobState, PipelineError> {
        let status: StatusResponse = self.get_json(&handle.status_url).await?;
        match status.status.as_str() {
            "COMPLETED" => {
                let result: VideoResult = self.get_json(&handle.response_url).await?;
                match result.video {
                    Some(video) => Ok(RemoteJobState::Completed { url: video.url }),
                    None => Ok(RemoteJobState::Failed {
                        reason: "completed without a video".to_string(),
                    }),
                }
            }
            "FAILED" | "ERROR" => Ok(RemoteJobState::Failed {
                reason: status.error.unwrap_or(status.status),
            }),
            _ => Ok(RemoteJobState::Pending {
                status: status.status,
            }),
        }
    }
}
