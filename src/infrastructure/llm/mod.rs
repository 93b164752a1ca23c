//! LLM provider implementations

mod factory;
mod http_client;
mod metered;
mod openai;
mod text;

pub use factory::{LlmProviderConfig, LlmProviderFactory};
pub use http_client::{HttpClient, HttpClientTrait};
pub use metered::chat_with_metrics;
pub use openai::OpenAiProvider;
pub use text::strip_code_fences;

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
