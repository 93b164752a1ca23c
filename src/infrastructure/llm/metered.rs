//! Chat calls with request metrics

use std::time::Instant;

use crate::domain::{DomainError, LlmProvider, LlmRequest, LlmResponse};
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

/// Send a chat request and record its duration, outcome and token usage under `purpose`
pub async fn chat_with_metrics(
    provider: &dyn LlmProvider,
    purpose: &str,
    model: &str,
    request: LlmRequest,
) -> Result<LlmResponse, DomainError> {
    let start = Instant::now();
    let result = provider.chat(model, request).await;

    let usage = result.as_ref().ok().and_then(|r| r.usage.as_ref());
    record_llm_request(LlmRequestMetricParams {
        purpose,
        model,
        duration: start.elapsed(),
        success: result.is_ok(),
        input_tokens: usage.map(|u| u64::from(u.prompt_tokens)),
        output_tokens: usage.map(|u| u64::from(u.completion_tokens)),
    });

    result
}
