use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSection;
use crate::error::{LlmError, RepogradeError};

use super::ChatModel;

/// OpenAI-compatible chat-completion client. Also serves self-hosted
/// endpoints that speak the same protocol via `base_url`.
#[derive(Debug)]
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiChat {
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f64) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
            max_tokens,
            temperature,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl ChatModel for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> crate::error::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        debug!(model = %self.model, "Calling chat completion API");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RepogradeError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(RepogradeError::Llm(LlmError::ApiError {
                status,
                body: text,
            }));
        }

        let result: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RepogradeError::Llm(LlmError::Parse(e.to_string())))?;

        let text = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        Ok(text)
    }
}

/// Create a chat model from configuration.
pub fn create_chat_model(config: &LlmSection) -> crate::error::Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" | "custom" => {
            if config.api_key.is_empty() {
                return Err(RepogradeError::Llm(LlmError::Config(
                    "llm.api_key is empty".to_string(),
                )));
            }
            let mut model = OpenAiChat::new(
                config.api_key.clone(),
                config.model.clone(),
                config.max_tokens,
                config.temperature,
            );
            if let Some(url) = &config.base_url {
                model = model.with_base_url(url.clone());
            }
            Ok(Box::new(model))
        }
        other => Err(RepogradeError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Use: openai, custom"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_crypto_provider() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }

    fn section(provider: &str, api_key: &str) -> LlmSection {
        LlmSection {
            provider: provider.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.to_string(),
            base_url: None,
            max_tokens: 500,
            temperature: 0.3,
        }
    }

    #[test]
    fn factory_accepts_openai_and_custom() {
        install_crypto_provider();
        let model = create_chat_model(&section("openai", "sk-test")).unwrap();
        assert_eq!(model.name(), "openai");
        assert_eq!(model.model_id(), "gpt-4o-mini");

        assert!(create_chat_model(&section("custom", "sk-test")).is_ok());
    }

    #[test]
    fn request_sends_system_and_user_messages() {
        let body = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "instructions".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: "data".to_string(),
                },
            ],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "data");
    }

    #[test]
    fn factory_rejects_unknown_provider_and_empty_key() {
        assert!(create_chat_model(&section("mystery", "sk-test")).is_err());
        assert!(create_chat_model(&section("openai", "")).is_err());
    }
}
