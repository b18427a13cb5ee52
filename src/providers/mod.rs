//! Transport adapters for the email and chat sources.
//!
//! Providers only move raw records; normalization happens in
//! [`crate::ingest`] so a provider can never put malformed state into the
//! store.

pub mod imap;
pub mod telegram;

pub use imap::{EmailConfig, ImapEmailProvider};
pub use telegram::{TelegramBotProvider, TelegramConfig};

use async_trait::async_trait;

use crate::error::ProviderError;

/// Source of raw email records (`{id?, from, subject, body, unread}`).
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The latest `limit` emails, oldest first.
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<serde_json::Value>, ProviderError>;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ProviderError>;
}

/// Source of raw chat records (`{chat_name, messages}`).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `max_chats` chats, each with up to `max_messages` of its newest
    /// text messages, oldest first.
    async fn fetch_chats(
        &self,
        max_chats: usize,
        max_messages: usize,
    ) -> Result<Vec<serde_json::Value>, ProviderError>;

    async fn send(&self, chat_name: &str, text: &str) -> Result<(), ProviderError>;
}
