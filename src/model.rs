//! Canonical message model shared by every stage of the engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the category every unmatched or failed item falls back to.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Email,
    Chat,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::Chat => "chat",
        };
        write!(f, "{s}")
    }
}

/// A normalized unit from either the email or chat source.
///
/// Bodies arrive already sanitized by the provider adapter; nothing here
/// strips markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier (provider-supplied or derived from content).
    pub id: String,
    pub source: Source,
    pub sender: String,
    /// Never null; a missing subject is the empty string.
    pub subject: String,
    pub body: String,
    pub unread: bool,
    /// Chat name for chat messages; `None` for email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl Message {
    /// Derive a deterministic id so that re-fetching the same record yields
    /// the same identifier.
    pub fn derive_id(source: Source, sender: &str, subject: &str, body: &str) -> String {
        let key = format!("{source}\u{1f}{sender}\u{1f}{subject}\u{1f}{body}");
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }
}

/// One taxonomy entry with its cached embedding.
#[derive(Debug, Clone)]
pub struct CategoryDescriptor {
    pub name: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Outcome of classifying a single subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// The subject that was classified (the message key).
    pub key: String,
    pub category: String,
    /// `None` when no similarity was computed (empty input or fallback).
    pub similarity: Option<f32>,
    /// True when the fallback was forced by an embedding failure.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl ClassificationResult {
    pub fn fallback(key: impl Into<String>, degraded: bool) -> Self {
        Self {
            key: key.into(),
            category: FALLBACK_CATEGORY.to_string(),
            similarity: None,
            degraded,
        }
    }
}
