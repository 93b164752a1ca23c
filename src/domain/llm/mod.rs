//! LLM provider domain models and traits
//!
//! Both the OCR adapter (vision extraction) and the SQL agent (query generation
//! and result summaries) talk to a chat model through [`LlmProvider`].

mod message;
mod provider;
mod request;
mod response;

pub use message::{ContentPart, Message, MessageRole};
pub use provider::LlmProvider;
pub use request::{LlmRequest, LlmRequestBuilder, LlmResponseFormat};
pub use response::{FinishReason, LlmResponse, Usage};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
