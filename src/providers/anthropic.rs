//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{AgoraError, Result};

use super::DecisionProvider;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Decision provider backed by the Anthropic Messages API
pub struct AnthropicProvider {
    name: String,
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: Client,
}

impl AnthropicProvider {
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
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl DecisionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![json!({"role": "user", "content": prompt})],
        };

        debug!(model = %self.model, "calling Anthropic messages API");
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgoraError::ProviderFailure(format!(
                "anthropic returned {status}: {body}"
            )));
        }

        let parsed: MessageResponse = response.json().await?;
        let text: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(AgoraError::ProviderFailure(
                "anthropic returned an empty completion".to_string(),
            ));
        }
        Ok(text)
    }
}
