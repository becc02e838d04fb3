use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AnalysisProvider, ProviderError};
use crate::config::AnalysisConfig;

const ERROR_BODY_PREVIEW: usize = 300;

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ProviderError::Api(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::Api(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(ProviderError::Api(format!("HTTP {status}: {preview}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::Api(format!("failed to read response: {err}")))?;
        debug!(model = %self.model, bytes = body.len(), "analysis provider responded");

        parse_completion(&body)
    }
}

fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::InvalidResponse(format!("malformed body: {err}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("response has no completion text".into()))
}
