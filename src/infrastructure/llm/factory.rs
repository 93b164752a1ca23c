use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::http_client::HttpClient;
use super::openai::{OpenAiProvider, DEFAULT_OPENAI_BASE_URL};
use crate::domain::{DomainError, LlmProvider};

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an OpenAI-compatible provider from configuration
    pub fn create(config: &LlmProviderConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        if config.api_key.trim().is_empty() {
            return Err(DomainError::configuration(
                "LLM API key is not set (llm.api_key or OPENAI_API_KEY)",
            ));
        }

        let http_client = HttpClient::with_timeout(Duration::from_secs(config.timeout_secs))?;
        let provider =
            OpenAiProvider::with_base_url(http_client, config.api_key.as_str(), config.base_url.as_str());

        Ok(Arc::new(provider))
    }

    /// Create an OpenAI provider directly
    pub fn create_openai(api_key: impl Into<String>) -> Arc<dyn LlmProvider> {
        Arc::new(OpenAiProvider::new(HttpClient::new(), api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_openai_provider() {
        let provider = LlmProviderFactory::create_openai("test-key");
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_factory_from_config() {
        let config = LlmProviderConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        };

        let provider = LlmProviderFactory::create(&config).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_factory_requires_api_key() {
        let result = LlmProviderFactory::create(&LlmProviderConfig::default());

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API key is not set"));
    }
}
