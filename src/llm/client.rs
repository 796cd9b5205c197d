//! Chat client for hosted LLM APIs

use crate::config::{LLMProvider, ModelConfig};
use crate::llm::{ChatMessage, LLMError, LLMResult, LanguageModel, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// HTTP chat client configured for a single model and temperature
pub struct ChatClient {
    client: Client,
    config: ModelConfig,
    api_base_url: String,
}

impl ChatClient {
    pub fn new(config: &ModelConfig) -> LLMResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LLMError::ConfigError(e.to_string()))?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            config: config.clone(),
            api_base_url,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Prepend the configured system prompt unless the caller supplied one
    fn with_system_prompt(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &self.config.system_prompt {
            if !messages.iter().any(|m| m.role == Role::System) {
                out.push(ChatMessage::system(system.clone()));
            }
        }
        out.extend_from_slice(messages);
        out
    }

    fn api_key(&self) -> LLMResult<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            LLMError::ConfigError(format!("{:?} requires an API key", self.config.provider))
        })
    }

    async fn openai_chat(&self, messages: &[ChatMessage]) -> LLMResult<String> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: Option<String>,
        }

        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&Request {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
            })
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::ApiError(format!("OpenAI error: {}", text)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LLMError::SerializationError(e.to_string()))?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LLMError::EmptyResponse(self.config.model.clone()))
    }

    async fn ollama_chat(&self, messages: &[ChatMessage]) -> LLMResult<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            stream: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            options: Option<Options>,
        }

        #[derive(Deserialize)]
        struct Response {
            message: ChatMessage,
        }

        let url = format!("{}/api/chat", self.api_base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                messages,
                stream: false,
                options: self.config.temperature.map(|temperature| Options { temperature }),
            })
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::ApiError(format!("Ollama error: {}", text)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LLMError::SerializationError(e.to_string()))?;
        Ok(result.message.content)
    }

    async fn gemini_chat(&self, messages: &[ChatMessage]) -> LLMResult<String> {
        #[derive(Serialize)]
        struct Request {
            contents: Vec<Content>,
            #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
            generation_config: Option<GenerationConfig>,
        }

        #[derive(Serialize, Deserialize)]
        struct Content {
            role: Option<String>,
            parts: Vec<Part>,
        }

        #[derive(Serialize, Deserialize)]
        struct Part {
            text: String,
        }

        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            candidates: Option<Vec<Candidate>>,
        }

        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }

        let api_key = self.api_key()?;

        // System instructions are folded into the first user turn
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let mut contents = Vec::new();
        for message in messages.iter().filter(|m| m.role != Role::System) {
            let role = match message.role {
                Role::Assistant => "model",
                _ => "user",
            };
            let text = if contents.is_empty() && !system.is_empty() {
                format!("{}\n\n{}", system.join("\n"), message.content)
            } else {
                message.content.clone()
            };
            contents.push(Content {
                role: Some(role.to_string()),
                parts: vec![Part { text }],
            });
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base_url, self.config.model, api_key
        );
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                contents,
                generation_config: self.config.temperature.map(|temperature| GenerationConfig { temperature }),
            })
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LLMError::ApiError(format!("Gemini error: {}", text)));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LLMError::SerializationError(e.to_string()))?;

        result
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| LLMError::EmptyResponse(self.config.model.clone()))
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> LLMResult<String> {
        let messages = self.with_system_prompt(messages);
        debug!(
            model = %self.config.model,
            temperature = ?self.config.temperature,
            messages = messages.len(),
            "Sending chat request"
        );

        match self.config.provider {
            LLMProvider::OpenAI => self.openai_chat(&messages).await,
            LLMProvider::Ollama => self.ollama_chat(&messages).await,
            LLMProvider::Gemini => self.gemini_chat(&messages).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_defaults_and_trailing_slash() {
        let client = ChatClient::new(&ModelConfig::default()).unwrap();
        assert_eq!(client.api_base_url, "https://api.openai.com/v1");

        let config = ModelConfig {
            provider: LLMProvider::Ollama,
            api_base_url: Some("http://gpu-box:11434/".to_string()),
            ..ModelConfig::default()
        };
        let client = ChatClient::new(&config).unwrap();
        assert_eq!(client.api_base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_system_prompt_added_once() {
        let config = ModelConfig {
            system_prompt: Some("You are a Cypher expert.".to_string()),
            ..ModelConfig::default()
        };
        let client = ChatClient::new(&config).unwrap();

        let messages = client.with_system_prompt(&[ChatMessage::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);

        let messages = client.with_system_prompt(&[ChatMessage::system("custom"), ChatMessage::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "custom");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let client = ChatClient::new(&ModelConfig::default()).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, LLMError::ConfigError(_)));
    }
}
