use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde::Deserialize;
use std::time::SystemTime;

use super::retry::parse_retry_after;
use super::{ChatCompletion, ChatProvider, ChatRequest, TranslationError};
use crate::config::ProviderOptions;
use crate::usage::TokenUsage;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, options: &ProviderOptions) -> Result<Self, TranslationError> {
        let http = Client::builder()
            .timeout(options.timeout())
            .build()
            .map_err(|error| TranslationError::Network(error.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", options.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, TranslationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|error| TranslationError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| parse_retry_after(value, SystemTime::now()));
            let body = response.text().await.unwrap_or_default();
            log::warn!("{} request failed with {status}", self.name());
            return Err(TranslationError::Http {
                status,
                body,
                retry_after,
            });
        }

        let payload = response
            .json::<CompletionResponse>()
            .await
            .map_err(|error| TranslationError::InvalidResponse(error.to_string()))?;

        let usage = payload.usage.unwrap_or_default();
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TranslationError::InvalidResponse("reply has no message content".into()))?;

        Ok(ChatCompletion {
            content: content.trim().to_string(),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}
