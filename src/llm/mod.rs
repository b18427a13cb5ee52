//! Completion service used for summaries, questions and reply drafting.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! `RigCompletion` bridges a rig `CompletionModel` to [`CompletionProvider`].

pub mod prompts;
mod rig_adapter;

pub use rig_adapter::RigCompletion;

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, LlmError};

/// One single-turn completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

/// A text completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl std::str::FromStr for LlmBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::InvalidValue {
                key: "UNIFY_LLM_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected anthropic or openai)"),
            }),
        }
    }
}

/// Configuration for creating a completion provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

impl LlmConfig {
    pub const DEFAULT_MAX_TOKENS: u64 = 1000;
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;

    /// Read `UNIFY_LLM_BACKEND` (default `anthropic`), the matching
    /// `ANTHROPIC_API_KEY`/`OPENAI_API_KEY` (or `UNIFY_LLM_API_KEY`),
    /// `UNIFY_LLM_MODEL`, `UNIFY_LLM_MAX_TOKENS` and `UNIFY_LLM_TEMPERATURE`.
    ///
    /// Returns `Ok(None)` when no API key is set; the completion tools then
    /// report `not_configured`.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let backend = match std::env::var("UNIFY_LLM_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => LlmBackend::Anthropic,
        };

        let (key_var, default_model) = match backend {
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
            LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
        };
        let Ok(api_key) = std::env::var("UNIFY_LLM_API_KEY").or_else(|_| std::env::var(key_var))
        else {
            return Ok(None);
        };

        let temperature = match std::env::var("UNIFY_LLM_TEMPERATURE") {
            Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "UNIFY_LLM_TEMPERATURE".to_string(),
                message: format!("'{raw}' is not a number"),
            })?,
            Err(_) => Self::DEFAULT_TEMPERATURE,
        };

        Ok(Some(Self {
            backend,
            api_key: SecretString::from(api_key),
            model: std::env::var("UNIFY_LLM_MODEL").unwrap_or_else(|_| default_model.to_string()),
            max_tokens: std::env::var("UNIFY_LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(Self::DEFAULT_MAX_TOKENS),
            temperature,
        }))
    }
}

/// Create a completion provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => create_anthropic_provider(config),
        LlmBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_anthropic_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!(model = %config.model, "Using Anthropic completion backend");
    Ok(Arc::new(RigCompletion::new(model, "anthropic", &config.model)))
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!(model = %config.model, "Using OpenAI completion backend");
    Ok(Arc::new(RigCompletion::new(model, "openai", &config.model)))
}
