use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{GenerationClient, GenerationInput, GenerationOutput, unsupported_input};
use crate::config::VideoApiConfig;
use crate::error::{PipelineError, ensure_success};

const SERVICE: &str = "runway";

#[derive(Debug, Deserialize)]
struct GenerateVideoResponse {
    video_url: Option<String>,
}

/// Image-to-video API; answers synchronously with a downloadable video URL.
#[derive(Clone)]
pub struct RunwayClient {
    client: Client,
    config: VideoApiConfig,
}

impl RunwayClient {
    pub fn new(config: VideoApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }
}

#[async_trait]
impl GenerationClient for RunwayClient {
    fn service(&self) -> &'static str {
        SERVICE
    }

    async fn generate(&self, input: &GenerationInput) -> Result<GenerationOutput, PipelineError> {
        let GenerationInput::ImageToVideo { image_url } = input else {
            return Err(unsupported_input(SERVICE, input));
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "img_prompt": image_url,
                "motion": 5,
                "seed": 0,
                "upscale": true,
                "interpolate": true,
                "callback_url": "",
            }))
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let text = response
            .text()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let payload: GenerateVideoResponse =
            serde_json::from_str(&text).map_err(|err| PipelineError::Upstream {
                service: SERVICE,
                status: None,
                body: format!("unreadable response ({err}): {text}"),
            })?;
        payload
            .video_url
            .filter(|url| !url.trim().is_empty())
            .map(GenerationOutput::ResultUrl)
            .ok_or_else(|| PipelineError::Upstream {
                service: SERVICE,
                status: None,
                body: format!("no video_url in response: {text}"),
            })
    }
}
