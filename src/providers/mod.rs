//! Decision provider integrations.
//!
//! Every provider is polymorphic over a single capability (produce a
//! response string for a prompt), so the decision engine never knows
//! which vendor backs a given agent. A registry maps the `model` key on
//! each agent to a configured provider instance.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{AgoraError, Result};

/// One decision model: turn a prompt into a response string.
///
/// Implementations surface failures as typed errors; an empty response
/// is an error, never a silent no-op.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Registry key this provider is addressed by
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Maps agent `model` keys to provider instances
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DecisionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration entries
    pub fn from_config(configs: &[ProviderConfig], max_tokens: u32) -> Self {
        let mut registry = Self::new();
        for cfg in configs {
            let provider: Arc<dyn DecisionProvider> = match cfg.kind {
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(cfg, max_tokens)),
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(cfg, max_tokens)),
            };
            registry.register(provider);
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn DecisionProvider>) {
        info!(name = provider.name(), "registered decision provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DecisionProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AgoraError::ProviderNotRegistered(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl DecisionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProvider));

        let provider = registry.get("echo").unwrap();
        assert_eq!(provider.generate("hi").await.unwrap(), "hi");

        assert!(matches!(
            registry.get("missing"),
            Err(AgoraError::ProviderNotRegistered(_))
        ));
    }
}
