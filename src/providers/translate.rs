use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::OpenAiConfig;
use crate::error::{PipelineError, ensure_success};

const SERVICE: &str = "openai";
const TRANSLATION_MODEL: &str = "gpt-3.5-turbo";
const TRANSLATION_PROMPT: &str = "Translate the following Korean text to English.";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_to_english(&self, text: &str) -> Result<String, PipelineError>;
}

/// True when Hangul makes up the majority of the alphabetic characters.
pub fn is_korean(text: &str) -> bool {
    let mut hangul = 0usize;
    let mut letters = 0usize;
    for ch in text.chars().filter(|ch| ch.is_alphabetic()) {
        letters += 1;
        if is_hangul(ch) {
            hangul += 1;
        }
    }
    letters > 0 && hangul * 2 > letters
}

fn is_hangul(ch: char) -> bool {
    matches!(ch,
        '\u{AC00}'..='\u{D7A3}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{A960}'..='\u{A97F}'
        | '\u{D7B0}'..='\u{D7FF}')
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiTranslator {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiTranslator {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate_to_english(&self, text: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.api_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": TRANSLATION_MODEL,
                "messages": [
                    {"role": "system", "content": TRANSLATION_PROMPT},
                    {"role": "user", "content": text}
                ],
                "max_tokens": 50
            }))
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let content = payload
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|msg| msg.content)
            .ok_or_else(|| PipelineError::Upstream {
                service: SERVICE,
                status: None,
                body: "no translation returned".to_string(),
            })?;
        Ok(clean_translation(&content))
    }
}

fn clean_translation(content: &str) -> String {
    content.trim().trim_matches('"').trim().to_string()
}
