//! Engine configuration.

use std::time::Duration;

use crate::store::ChatLimits;

/// Limits and timeouts for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Character budget for every body/message preview in a view.
    pub preview_chars: usize,
    /// Size of the sender/subject samples in the summary view.
    pub sample_size: usize,
    /// Item limit used when a view request names none.
    pub default_view_limit: usize,
    /// Maximum number of chats kept in the chat index.
    pub max_chats: usize,
    /// Maximum messages kept per chat (newest win).
    pub max_messages_per_chat: usize,
    /// Number of latest emails requested from the email provider.
    pub fetch_limit: usize,
    /// Deadline for provider fetch/send calls.
    pub fetch_timeout: Duration,
    /// Deadline for one embedding call during classification.
    pub embedding_timeout: Duration,
    /// Deadline for one completion call.
    pub completion_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_chars: 300,
            sample_size: 10,
            default_view_limit: 20,
            max_chats: 5,
            max_messages_per_chat: 3,
            fetch_limit: 100,
            fetch_timeout: Duration::from_secs(30),
            embedding_timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Build from `UNIFY_*` environment variables, keeping defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            preview_chars: env_parse("UNIFY_PREVIEW_CHARS").unwrap_or(defaults.preview_chars),
            sample_size: env_parse("UNIFY_SAMPLE_SIZE").unwrap_or(defaults.sample_size),
            default_view_limit: env_parse("UNIFY_VIEW_LIMIT")
                .unwrap_or(defaults.default_view_limit),
            max_chats: env_parse("UNIFY_MAX_CHATS").unwrap_or(defaults.max_chats),
            max_messages_per_chat: env_parse("UNIFY_MAX_MESSAGES_PER_CHAT")
                .unwrap_or(defaults.max_messages_per_chat),
            fetch_limit: env_parse("UNIFY_FETCH_LIMIT").unwrap_or(defaults.fetch_limit),
            fetch_timeout: env_parse("UNIFY_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            embedding_timeout: env_parse("UNIFY_EMBEDDING_CALL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.embedding_timeout),
            completion_timeout: env_parse("UNIFY_COMPLETION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.completion_timeout),
        }
    }

    pub fn chat_limits(&self) -> ChatLimits {
        ChatLimits {
            max_chats: self.max_chats,
            max_messages_per_chat: self.max_messages_per_chat,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("UNIFY_PORT").unwrap_or(Self::default().port),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
