//! Chat-completion provider seam shared by the batch translator.

pub mod openai;
pub mod prompt;
pub mod response;
pub mod retry;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::usage::TokenUsage;
use retry::{is_retryable_status, RetryError};

pub use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("request to translation provider failed: {0}")]
    Network(String),
    #[error("translation provider returned {status}: {body}")]
    Http {
        status: StatusCode,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("translation provider sent an unreadable reply: {0}")]
    InvalidResponse(String),
    #[error("no response obtained after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<TranslationError>,
    },
}

impl TranslationError {
    /// Authentication, permission and request-shape failures. Retrying or
    /// moving on to the next batch cannot help.
    pub fn is_fatal(&self) -> bool {
        match self {
            TranslationError::Http { status, .. } => !is_retryable_status(*status),
            TranslationError::Exhausted { last, .. } => last.is_fatal(),
            TranslationError::Network(_) | TranslationError::InvalidResponse(_) => false,
        }
    }

    pub fn retry_class(&self) -> RetryError {
        match self {
            TranslationError::Http {
                status,
                retry_after,
                ..
            } => RetryError::Http {
                status: *status,
                retry_after: *retry_after,
            },
            TranslationError::Network(_) => RetryError::Network,
            TranslationError::InvalidResponse(_) => RetryError::Malformed,
            TranslationError::Exhausted { .. } => RetryError::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of a chat-completions call; serializes to the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// Assistant message text, trimmed.
    pub content: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, TranslationError>;
}
