//! Telegram chat provider over the Bot API.
//!
//! Reads recent text messages with a non-blocking `getUpdates` poll and
//! groups them per chat. Sending resolves a chat name to the chat id seen
//! in earlier updates.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::RwLock;

use super::ChatProvider;
use crate::error::ProviderError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const PROVIDER: &str = "telegram";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base: String,
}

impl TelegramConfig {
    /// Returns `None` if `TELEGRAM_BOT_TOKEN` is not set (provider disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        Some(Self {
            bot_token: SecretString::from(bot_token),
            api_base: std::env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
        })
    }
}

/// One chat assembled from updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatGroup {
    pub chat_id: i64,
    pub chat_name: String,
    /// Oldest first.
    pub messages: Vec<String>,
}

pub struct TelegramBotProvider {
    config: TelegramConfig,
    client: reqwest::Client,
    /// Chat name → chat id, learned from fetched updates.
    known_chats: RwLock<HashMap<String, i64>>,
}

impl TelegramBotProvider {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            known_chats: RwLock::new(HashMap::new()),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token.expose_secret()
        )
    }

    async fn resolve_chat_id(&self, chat_name: &str) -> Result<i64, ProviderError> {
        if let Some(id) = self.known_chats.read().await.get(chat_name) {
            return Ok(*id);
        }
        chat_name
            .trim()
            .parse::<i64>()
            .map_err(|_| ProviderError::UnknownRecipient {
                name: PROVIDER.into(),
                recipient: chat_name.to_string(),
            })
    }

    async fn send_message_chunk(&self, chat_id: i64, text: &str) -> Result<(), ProviderError> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| ProviderError::SendFailed {
                name: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed {
                name: PROVIDER.into(),
                reason: format!("sendMessage returned {status}: {body}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatProvider for TelegramBotProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_chats(
        &self,
        max_chats: usize,
        max_messages: usize,
    ) -> Result<Vec<Value>, ProviderError> {
        let fetch_failed = |reason: String| ProviderError::FetchFailed {
            name: PROVIDER.into(),
            reason,
        };

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&json!({ "timeout": 0, "allowed_updates": ["message"] }))
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthFailed {
                name: PROVIDER.into(),
            });
        }
        if !resp.status().is_success() {
            return Err(fetch_failed(format!("getUpdates returned {}", resp.status())));
        }

        let data: Value = resp.json().await.map_err(|e| fetch_failed(e.to_string()))?;
        let updates = data
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| fetch_failed("getUpdates response has no result array".into()))?;

        let groups = group_updates(updates, max_chats, max_messages);
        {
            let mut known = self.known_chats.write().await;
            for group in &groups {
                known.insert(group.chat_name.clone(), group.chat_id);
            }
        }

        tracing::info!(
            updates = updates.len(),
            chats = groups.len(),
            "Fetched Telegram chats"
        );
        Ok(groups
            .into_iter()
            .map(|g| json!({ "chat_name": g.chat_name, "messages": g.messages, "chat_id": g.chat_id }))
            .collect())
    }

    /// Splits long messages that exceed Telegram's 4096 char limit.
    async fn send(&self, chat_name: &str, text: &str) -> Result<(), ProviderError> {
        let chat_id = self.resolve_chat_id(chat_name).await?;
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        for chunk in &chunks {
            self.send_message_chunk(chat_id, chunk).await?;
        }
        tracing::info!(chat = chat_name, chunks = chunks.len(), "Telegram message sent");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Display name for a chat: group title, else first (and last) name, else
/// username, else the numeric id.
fn chat_display_name(chat: &Value) -> Option<String> {
    let str_field = |key: &str| chat.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

    if let Some(title) = str_field("title") {
        return Some(title.to_string());
    }
    if let Some(first) = str_field("first_name") {
        return Some(match str_field("last_name") {
            Some(last) => format!("{first} {last}"),
            None => first.to_string(),
        });
    }
    if let Some(username) = str_field("username") {
        return Some(username.to_string());
    }
    chat.get("id").and_then(Value::as_i64).map(|id| id.to_string())
}

/// Group text updates by chat.
///
/// Updates arrive oldest first. The result holds the `max_chats` chats with
/// the most recent activity (most recent first), each with its newest
/// `max_messages` texts in chronological order.
pub fn group_updates(updates: &[Value], max_chats: usize, max_messages: usize) -> Vec<ChatGroup> {
    // chat id → (group, position of its latest update)
    let mut by_chat: HashMap<i64, (ChatGroup, usize)> = HashMap::new();

    for (position, update) in updates.iter().enumerate() {
        let Some(message) = update.get("message") else {
            continue;
        };
        let Some(text) = message.get("text").and_then(Value::as_str) else {
            continue;
        };
        let Some(chat) = message.get("chat") else {
            continue;
        };
        let Some(chat_id) = chat.get("id").and_then(Value::as_i64) else {
            continue;
        };
        let Some(chat_name) = chat_display_name(chat) else {
            continue;
        };

        let entry = by_chat.entry(chat_id).or_insert_with(|| {
            (
                ChatGroup {
                    chat_id,
                    chat_name,
                    messages: Vec::new(),
                },
                position,
            )
        });
        entry.0.messages.push(text.to_string());
        entry.1 = position;
    }

    let mut groups: Vec<(ChatGroup, usize)> = by_chat.into_values().collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
        .into_iter()
        .take(max_chats)
        .map(|(mut group, _)| {
            let excess = group.messages.len().saturating_sub(max_messages);
            group.messages.drain(..excess);
            group
        })
        .collect()
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char
/// boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut hard_cut = max_len;
        while !remaining.is_char_boundary(hard_cut) {
            hard_cut -= 1;
        }
        let chunk = &remaining[..hard_cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(hard_cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { hard_cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
