//! Language model service
//!
//! [`LanguageModel`] is the seam between the orchestration code and whatever
//! produces text. [`client::ChatClient`] talks to hosted chat APIs; tests plug
//! in their own implementations.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::ChatClient;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Empty response from model {0}")]
    EmptyResponse(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Something that turns a conversation into generated text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logging
    fn model_name(&self) -> &str;

    /// Generate a reply to `messages`
    async fn chat(&self, messages: &[ChatMessage]) -> LLMResult<String>;

    /// Single user prompt
    async fn complete(&self, prompt: &str) -> LLMResult<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }
}
