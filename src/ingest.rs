//! Ingestion normalizer: raw provider records → canonical [`Message`]s.
//!
//! Pure string/JSON handling, no I/O. A batch either normalizes completely
//! or fails with the index of the first offending record.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::IngestError;
use crate::model::{Message, Source};

/// Sender shown when an email record has no `from` field.
pub const UNKNOWN_SENDER: &str = "(Unknown Sender)";

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*([^<>\s]+@[^<>\s]+)\s*>").expect("valid regex"));

/// A chat thread after normalization: name plus messages, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatThread {
    pub chat_name: String,
    pub messages: Vec<String>,
}

impl ChatThread {
    /// Expand into canonical chat [`Message`]s.
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .map(|text| Message {
                id: Message::derive_id(Source::Chat, &self.chat_name, "", text),
                source: Source::Chat,
                sender: self.chat_name.clone(),
                subject: String::new(),
                body: text.clone(),
                unread: false,
                chat_id: Some(self.chat_name.clone()),
            })
            .collect()
    }
}

/// Normalize a batch of email records.
///
/// Record shape: `{"from", "subject", "body", "unread", "id"?}`. `unread`
/// may be a boolean or the strings `"true"`/`"false"`.
pub fn normalize_emails(records: &[Value]) -> Result<Vec<Message>, IngestError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_email(index, record))
        .collect()
}

fn normalize_email(index: usize, record: &Value) -> Result<Message, IngestError> {
    let obj = record.as_object().ok_or_else(|| malformed(index, "record is not an object"))?;

    let sender = optional_str(index, obj.get("from"), "from")?
        .unwrap_or(UNKNOWN_SENDER)
        .to_string();
    let subject = optional_str(index, obj.get("subject"), "subject")?
        .unwrap_or_default()
        .to_string();
    let body = optional_str(index, obj.get("body"), "body")?
        .unwrap_or_default()
        .to_string();
    let unread = match obj.get("unread") {
        None | Some(Value::Null) => false,
        Some(value) => parse_unread(value).ok_or_else(|| {
            malformed(index, format!("unread must be a boolean or \"true\"/\"false\", got {value}"))
        })?,
    };
    let id = match optional_str(index, obj.get("id"), "id")? {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Message::derive_id(Source::Email, &sender, &subject, &body),
    };

    Ok(Message {
        id,
        source: Source::Email,
        sender,
        subject,
        body,
        unread,
        chat_id: None,
    })
}

/// Canonicalize an unread flag.
///
/// Only a JSON boolean or the literal strings `true`/`false` (any case,
/// surrounding whitespace ignored) are accepted; the truthiness of other
/// strings is never trusted.
pub fn parse_unread(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Normalize a batch of chat records: `{"chat_name", "messages": [..]}`.
pub fn normalize_chats(records: &[Value]) -> Result<Vec<ChatThread>, IngestError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let obj = record.as_object().ok_or_else(|| malformed(index, "record is not an object"))?;
            let chat_name = optional_str(index, obj.get("chat_name"), "chat_name")?
                .ok_or_else(|| malformed(index, "missing chat_name"))?;
            let messages = match obj.get("messages") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| malformed(index, "chat messages must be strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(malformed(index, "messages must be an array")),
            };
            normalize_chat(index, chat_name, messages)
        })
        .collect()
}

/// Build one chat thread from already-typed inputs.
pub fn normalize_chat(
    index: usize,
    chat_name: &str,
    messages: Vec<String>,
) -> Result<ChatThread, IngestError> {
    let chat_name = chat_name.trim();
    if chat_name.is_empty() {
        return Err(malformed(index, "chat_name is empty"));
    }
    Ok(ChatThread {
        chat_name: chat_name.to_string(),
        messages,
    })
}

/// Extract the bare address from a `From` header value.
///
/// `"Alice <alice@example.com>"` → `alice@example.com`. A value without
/// angle brackets is returned trimmed.
pub fn sender_address(from: &str) -> String {
    ANGLE_ADDRESS
        .captures(from)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| from.trim().to_string())
}

fn optional_str<'a>(
    index: usize,
    value: Option<&'a Value>,
    field: &str,
) -> Result<Option<&'a str>, IngestError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(malformed(index, format!("{field} must be a string, got {other}"))),
    }
}

fn malformed(index: usize, reason: impl Into<String>) -> IngestError {
    IngestError::MalformedRecord {
        index,
        reason: reason.into(),
    }
}
