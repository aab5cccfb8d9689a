//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role};

/// Adapter over any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    provider: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider: provider.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let preamble = request.system_prompt();
        let prompt = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut builder = self.model.completion_request(Message::user(prompt));
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_provider_error(&self.provider, &e.to_string()))?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.clone(),
                reason: "response contained no text".to_string(),
            });
        }

        debug!(
            model = %self.model_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens as u32,
            output_tokens: response.usage.output_tokens as u32,
        })
    }
}

/// Map a provider error message onto our error taxonomy.
///
/// rig surfaces HTTP status and provider error codes only through the
/// rendered message, so classification is textual.
pub(crate) fn classify_provider_error(provider: &str, message: &str) -> LlmError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient_quota") || lower.contains("quota") {
        LlmError::QuotaExceeded {
            provider: provider.to_string(),
            reason: message.to_string(),
        }
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit")
    {
        LlmError::RateLimited {
            provider: provider.to_string(),
        }
    } else if lower.contains("401")
        || lower.contains("invalid_api_key")
        || lower.contains("authentication")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message.to_string(),
        }
    }
}
