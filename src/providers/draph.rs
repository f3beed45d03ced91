use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};

use super::{GenerationClient, GenerationInput, GenerationOutput, unsupported_input};
use crate::config::DraphConfig;
use crate::error::{PipelineError, ensure_success};

const SERVICE: &str = "draph";

/// Background generation API. Takes the product image as a multipart upload
/// and answers with the generated image as a base64 body.
#[derive(Clone)]
pub struct DraphClient {
    client: Client,
    config: DraphConfig,
}

impl DraphClient {
    pub fn new(config: DraphConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    fn form(
        &self,
        image: &[u8],
        gen_type: &str,
        output_w: u32,
        output_h: u32,
        concept_option: &str,
    ) -> Result<Form, PipelineError> {
        let part = Part::bytes(image.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        Ok(Form::new()
            .part("image", part)
            .text("username", self.config.user_name.clone())
            .text("gen_type", gen_type.to_string())
            .text("multiblob_sod", self.config.multiblob_sod.clone())
            .text("output_w", output_w.to_string())
            .text("output_h", output_h.to_string())
            .text("bg_color_hex_code", self.config.bg_color_hex_code.clone())
            .text("concept_option", concept_option.to_string()))
    }
}

#[async_trait]
impl GenerationClient for DraphClient {
    fn service(&self) -> &'static str {
        SERVICE
    }

    async fn generate(&self, input: &GenerationInput) -> Result<GenerationOutput, PipelineError> {
        let GenerationInput::Background {
            image,
            gen_type,
            output_w,
            output_h,
            concept_option,
        } = input
        else {
            return Err(unsupported_input(SERVICE, input));
        };

        let form = self.form(image, gen_type.as_str(), *output_w, *output_h, concept_option)?;
        tracing::debug!(%gen_type, output_w, output_h, "requesting background generation");
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        Ok(GenerationOutput::Inline(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Router,
        extract::{Multipart, State},
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        routing::post,
    };

    use super::*;
    use crate::records::GenType;
    use crate::testing::spawn_server;

    #[derive(Default)]
    struct Seen {
        authorization: Option<String>,
        fields: Vec<(String, Vec<u8>)>,
    }

    type Shared = Arc<Mutex<Seen>>;

    async fn generate(State(seen): State<Shared>, headers: HeaderMap, mut form: Multipart) -> &'static str {
        let mut fields = Vec::new();
        while let Some(field) = form.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            fields.push((name, field.bytes().await.unwrap().to_vec()));
        }
        let mut seen = seen.lock().unwrap();
        seen.authorization = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        seen.fields = fields;
        "aGVsbG8="
    }

    fn client(api_url: String) -> DraphClient {
        DraphClient::new(DraphConfig {
            api_url,
            api_key: "draph-key".to_string(),
            user_name: "shop".to_string(),
            multiblob_sod: "0".to_string(),
            bg_color_hex_code: "#FFFFFF".to_string(),
        })
    }

    fn input() -> GenerationInput {
        GenerationInput::Background {
            image: b"jpeg bytes".to_vec(),
            gen_type: GenType::Concept,
            output_w: 1000,
            output_h: 800,
            concept_option: r#"{"category":"food"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn sends_the_form_with_bearer_auth_and_returns_the_body() {
        let seen = Shared::default();
        let router = Router::new()
            .route("/generate", post(generate))
            .with_state(seen.clone());
        let base = spawn_server(router).await;

        let output = client(format!("{base}/generate")).generate(&input()).await.unwrap();

        assert_eq!(output, GenerationOutput::Inline(b"aGVsbG8=".to_vec()));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.authorization.as_deref(), Some("Bearer draph-key"));
        let field = |name: &str| {
            seen.fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| String::from_utf8_lossy(value).to_string())
        };
        let names: Vec<&str> = seen.fields.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            [
                "image",
                "username",
                "gen_type",
                "multiblob_sod",
                "output_w",
                "output_h",
                "bg_color_hex_code",
                "concept_option"
            ]
        );
        assert_eq!(field("image").as_deref(), Some("jpeg bytes"));
        assert_eq!(field("gen_type").as_deref(), Some("concept"));
        assert_eq!(field("output_h").as_deref(), Some("800"));
        assert_eq!(field("concept_option").as_deref(), Some(r#"{"category":"food"}"#));
    }

    #[tokio::test]
    async fn non_success_status_surfaces_code_and_body() {
        let router = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = spawn_server(router).await;

        let err = client(format!("{base}/generate"))
            .generate(&input())
            .await
            .unwrap_err();

        match err {
            PipelineError::Upstream {
                service: "draph",
                status: Some(429),
                body,
            } => assert_eq!(body, "slow down"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_inputs_are_rejected_without_a_request() {
        let client = client("http://127.0.0.1:9/unused".to_string());
        let err = client
            .generate(&GenerationInput::TextToVideo {
                prompt: "rocket".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upstream { status: None, .. }));
    }
}
