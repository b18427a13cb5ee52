//! Error types for the unified inbox engine.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("{0} is not configured")]
    NotConfigured(String),
}

impl EngineError {
    /// Stable, machine-readable kind for structured error results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Ingest(_) => ErrorKind::MalformedRecord,
            Self::Taxonomy(_) => ErrorKind::Taxonomy,
            Self::View(ViewError::NotFound { .. }) => ErrorKind::ViewNotFound,
            Self::View(ViewError::InvalidLimit { .. }) => ErrorKind::InvalidParameters,
            Self::Llm(_) => ErrorKind::Llm,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
        }
    }

    /// Whether the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Provider(_))
    }

    pub(crate) fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }
}

/// Error categories surfaced to the tool dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Provider,
    MalformedRecord,
    Taxonomy,
    ViewNotFound,
    Llm,
    Timeout,
    NotConfigured,
    InvalidParameters,
    ToolNotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Provider => "provider",
            Self::MalformedRecord => "malformed_record",
            Self::Taxonomy => "taxonomy",
            Self::ViewNotFound => "view_not_found",
            Self::Llm => "llm",
            Self::Timeout => "timeout",
            Self::NotConfigured => "not_configured",
            Self::InvalidParameters => "invalid_parameters",
            Self::ToolNotFound => "tool_not_found",
        };
        write!(f, "{s}")
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the mail and chat transport adapters.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {name} fetch failed: {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("Provider {name} send failed: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Authentication failed for provider {name}")]
    AuthFailed { name: String },

    #[error("Unknown recipient on provider {name}: {recipient}")]
    UnknownRecipient { name: String, recipient: String },
}

/// Raw-record normalization errors. Any of these fails the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
}

/// Embedding call errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding call timed out after {0:?}")]
    Timeout(Duration),
}

/// Category taxonomy initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Taxonomy is empty")]
    Empty,

    #[error("Duplicate category name: {0}")]
    DuplicateName(String),

    #[error("Taxonomy has no fallback category \"{0}\"")]
    MissingFallback(String),

    #[error("Category {name} embedding has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Failed to embed category {name}: {source}")]
    Embedding {
        name: String,
        #[source]
        source: EmbeddingError,
    },
}

/// Context assembler errors.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("No view found for resource key: {key}")]
    NotFound { key: String },

    #[error("Invalid limit in resource key {key}: {value}")]
    InvalidLimit { key: String, value: String },
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
