//! OpenAI-compatible chat completions client.
//!
//! Also fronts xAI and other vendors exposing the same wire shape; pick
//! the vendor with `base_url`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{AgoraError, Result};

use super::DecisionProvider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Decision provider speaking the chat-completions dialect
pub struct OpenAiProvider {
    name: String,
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: Client,
}

impl OpenAiProvider {
    pub fn new(cfg: &ProviderConfig, max_tokens: u32) -> Self {
        Self {
            name: cfg.name.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens,
            http: Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl DecisionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![json!({"role": "user", "content": prompt})],
        };

        debug!(model = %self.model, "calling chat completions API");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgoraError::ProviderFailure(format!(
                "chat completions returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AgoraError::ProviderFailure(
                "chat completions returned an empty completion".to_string(),
            ));
        }
        Ok(text)
    }
}
