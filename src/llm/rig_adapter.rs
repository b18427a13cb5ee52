//! Adapter from a rig-core completion model to [`CompletionProvider`].

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use super::{CompletionProvider, CompletionRequest};
use crate::error::LlmError;

/// Wraps a rig `CompletionModel`; each request builds a one-shot agent with
/// the request's preamble and sampling settings.
pub struct RigCompletion<M> {
    model: M,
    provider: &'static str,
    model_name: String,
}

impl<M> RigCompletion<M> {
    pub fn new(model: M, provider: &'static str, model_name: &str) -> Self {
        Self {
            model,
            provider,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> CompletionProvider for RigCompletion<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let agent = AgentBuilder::new(self.model.clone())
            .preamble(&request.system)
            .max_tokens(request.max_tokens)
            .temperature(request.temperature)
            .build();

        let text = agent
            .prompt(request.user.as_str())
            .await
            .map_err(|e| classify_prompt_error(self.provider, e.to_string()))?;

        if text.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "empty completion".to_string(),
            });
        }
        tracing::debug!(model = %self.model_name, chars = text.len(), "Completion received");
        Ok(text)
    }
}

fn classify_prompt_error(provider: &str, reason: String) -> LlmError {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("invalid x-api-key")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}
