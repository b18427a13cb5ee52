//! Context assembler: bounded JSON views over a [`StateSnapshot`].
//!
//! Views are addressed by resource keys of the form `scheme://selector`:
//!
//! | Key | View |
//! |---|---|
//! | `email://summary` | counts plus sender/subject samples |
//! | `email://categories` | category names with counts |
//! | `email://category/<name>` | first K items of one category |
//! | `email://unread` | first K unread items |
//! | `telegram://summary` | chat names and counts |
//! | `telegram://chat/<name>` | latest K messages of one chat |
//!
//! Any key may carry a `?limit=K` suffix. Every view is computed fresh from
//! the snapshot it is given; nothing is cached between calls.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::ViewError;
use crate::ingest::sender_address;
use crate::store::StateSnapshot;

/// A parsed resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKey {
    EmailSummary,
    EmailCategories,
    EmailCategory(String),
    EmailUnread,
    ChatSummary,
    Chat(String),
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// A resource key plus an optional item limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    pub key: ResourceKey,
    pub limit: Option<usize>,
}

impl ViewRequest {
    /// Parse `scheme://selector[?limit=K]`.
    pub fn parse(raw: &str) -> Result<Self, ViewError> {
        let not_found = || ViewError::NotFound {
            key: raw.to_string(),
        };

        // Only a trailing `?limit=<digits>` is a suffix; anything else belongs
        // to the selector.
        let (base, limit) = match raw.rsplit_once("?limit=") {
            Some((base, value)) if is_digits(value.trim()) => {
                let limit = value.trim().parse::<usize>().map_err(|_| ViewError::InvalidLimit {
                    key: raw.to_string(),
                    value: value.to_string(),
                })?;
                (base, Some(limit))
            }
            _ => (raw, None),
        };

        let (scheme, selector) = base.trim().split_once("://").ok_or_else(not_found)?;
        let key = match (scheme, selector) {
            ("email", "summary") => ResourceKey::EmailSummary,
            ("email", "categories") => ResourceKey::EmailCategories,
            ("email", "unread") => ResourceKey::EmailUnread,
            ("telegram", "summary") => ResourceKey::ChatSummary,
            ("email", s) => match s.strip_prefix("category/") {
                Some(name) if !name.is_empty() => ResourceKey::EmailCategory(name.to_string()),
                _ => return Err(not_found()),
            },
            ("telegram", s) => match s.strip_prefix("chat/") {
                Some(name) if !name.is_empty() => ResourceKey::Chat(name.to_string()),
                _ => return Err(not_found()),
            },
            _ => return Err(not_found()),
        };

        Ok(Self { key, limit })
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailSummary => write!(f, "email://summary"),
            Self::EmailCategories => write!(f, "email://categories"),
            Self::EmailCategory(name) => write!(f, "email://category/{name}"),
            Self::EmailUnread => write!(f, "email://unread"),
            Self::ChatSummary => write!(f, "telegram://summary"),
            Self::Chat(name) => write!(f, "telegram://chat/{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    /// Messages stored, duplicates included.
    pub total_count: usize,
    /// Distinct subjects; the unit of every other email view.
    pub unique_subjects: usize,
    /// Distinct unread subjects.
    pub unread_count: usize,
    pub sender_sample: Vec<String>,
    pub subject_sample: Vec<String>,
    pub category_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemPreview {
    pub subject: String,
    pub preview: String,
    pub is_unread: bool,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryView {
    pub category: String,
    pub total_count: usize,
    pub items: Vec<ItemPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnreadView {
    pub total_count: usize,
    pub items: Vec<ItemPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoriesView {
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSummaryView {
    pub total_count: usize,
    pub message_count: usize,
    pub chat_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatView {
    pub chat: String,
    pub total_count: usize,
    pub items: Vec<String>,
}

/// Describes one resolvable resource key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDescriptor {
    pub key: String,
    pub description: String,
}

/// Builds views with fixed size budgets.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    preview_chars: usize,
    sample_size: usize,
    default_limit: usize,
    /// Taxonomy names; a known category with no items yields an empty view
    /// rather than not-found.
    known_categories: Vec<String>,
}

impl ContextAssembler {
    pub fn new(config: &EngineConfig, known_categories: Vec<String>) -> Self {
        Self {
            preview_chars: config.preview_chars,
            sample_size: config.sample_size,
            default_limit: config.default_view_limit,
            known_categories,
        }
    }

    /// Resolve a raw resource key against `snapshot`.
    ///
    /// An explicit `limit` argument takes precedence over a `?limit=` suffix.
    pub fn resolve(
        &self,
        snapshot: &StateSnapshot,
        raw_key: &str,
        limit: Option<usize>,
    ) -> Result<serde_json::Value, ViewError> {
        let request = ViewRequest::parse(raw_key)?;
        let limit = limit.or(request.limit).unwrap_or(self.default_limit);

        let value = match request.key {
            ResourceKey::EmailSummary => to_value(self.summary_view(snapshot)),
            ResourceKey::EmailCategories => to_value(self.categories_view(snapshot)),
            ResourceKey::EmailCategory(name) => to_value(self.category_view(snapshot, &name, limit)?),
            ResourceKey::EmailUnread => to_value(self.unread_view(snapshot, limit)),
            ResourceKey::ChatSummary => to_value(self.chat_summary_view(snapshot)),
            ResourceKey::Chat(name) => to_value(self.chat_view(snapshot, &name, limit)?),
        };
        Ok(value)
    }

    pub fn summary_view(&self, snapshot: &StateSnapshot) -> SummaryView {
        let messages = snapshot.messages();
        let start = messages.len().saturating_sub(self.sample_size);
        let recent = &messages[start..];

        SummaryView {
            total_count: messages.len(),
            unique_subjects: snapshot.subjects().len(),
            unread_count: snapshot.unread_set().len(),
            sender_sample: recent.iter().map(|m| sender_address(&m.sender)).collect(),
            subject_sample: recent.iter().map(|m| m.subject.clone()).collect(),
            category_names: snapshot.category_index().keys().cloned().collect(),
        }
    }

    pub fn categories_view(&self, snapshot: &StateSnapshot) -> CategoriesView {
        CategoriesView {
            categories: snapshot
                .category_index()
                .iter()
                .map(|(name, subjects)| CategoryCount {
                    name: name.clone(),
                    count: subjects.len(),
                })
                .collect(),
        }
    }

    pub fn category_view(
        &self,
        snapshot: &StateSnapshot,
        name: &str,
        limit: usize,
    ) -> Result<CategoryView, ViewError> {
        let subjects: &[String] = match snapshot.category_index().get(name) {
            Some(subjects) => subjects,
            None if self.known_categories.iter().any(|c| c == name) => &[],
            None => {
                return Err(ViewError::NotFound {
                    key: ResourceKey::EmailCategory(name.to_string()).to_string(),
                });
            }
        };

        Ok(CategoryView {
            category: name.to_string(),
            total_count: subjects.len(),
            items: subjects
                .iter()
                .take(limit)
                .map(|s| self.item_preview(snapshot, s))
                .collect(),
        })
    }

    pub fn unread_view(&self, snapshot: &StateSnapshot, limit: usize) -> UnreadView {
        let unread: Vec<&String> = snapshot
            .subjects()
            .iter()
            .filter(|s| snapshot.is_unread(s))
            .collect();

        UnreadView {
            total_count: unread.len(),
            items: unread
                .into_iter()
                .take(limit)
                .map(|s| self.item_preview(snapshot, s))
                .collect(),
        }
    }

    pub fn chat_summary_view(&self, snapshot: &StateSnapshot) -> ChatSummaryView {
        let chats = snapshot.chat_index();
        ChatSummaryView {
            total_count: chats.len(),
            message_count: chats.message_count(),
            chat_names: chats.names().map(str::to_string).collect(),
        }
    }

    /// The latest `limit` messages of one chat, oldest first.
    pub fn chat_view(
        &self,
        snapshot: &StateSnapshot,
        name: &str,
        limit: usize,
    ) -> Result<ChatView, ViewError> {
        let thread = snapshot.chat_index().get(name).ok_or_else(|| ViewError::NotFound {
            key: ResourceKey::Chat(name.to_string()).to_string(),
        })?;
        let start = thread.messages.len().saturating_sub(limit);

        Ok(ChatView {
            chat: thread.chat_name.clone(),
            total_count: thread.messages.len(),
            items: thread.messages[start..]
                .iter()
                .map(|m| truncate_preview(m, self.preview_chars))
                .collect(),
        })
    }

    /// Every key resolvable against `snapshot` right now.
    pub fn list_resources(&self, snapshot: &StateSnapshot) -> Vec<ResourceDescriptor> {
        let mut resources = vec![
            describe(ResourceKey::EmailSummary, "Email counts with recent senders and subjects"),
            describe(ResourceKey::EmailCategories, "Email categories with item counts"),
            describe(ResourceKey::EmailUnread, "Unread emails with body previews"),
            describe(ResourceKey::ChatSummary, "Telegram chats with message counts"),
        ];
        for (name, subjects) in snapshot.category_index() {
            resources.push(describe(
                ResourceKey::EmailCategory(name.clone()),
                &format!("{} email(s) categorized as {name}", subjects.len()),
            ));
        }
        for name in snapshot.chat_index().names() {
            resources.push(describe(
                ResourceKey::Chat(name.to_string()),
                &format!("Recent messages in chat {name}"),
            ));
        }
        resources
    }

    fn item_preview(&self, snapshot: &StateSnapshot, subject: &str) -> ItemPreview {
        ItemPreview {
            subject: subject.to_string(),
            preview: truncate_preview(snapshot.body(subject).unwrap_or_default(), self.preview_chars),
            is_unread: snapshot.is_unread(subject),
            sender: snapshot.sender(subject).unwrap_or_default().to_string(),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, ending in `…` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn describe(key: ResourceKey, description: &str) -> ResourceDescriptor {
    ResourceDescriptor {
        key: key.to_string(),
        description: description.to_string(),
    }
}

fn to_value<T: Serialize>(view: T) -> serde_json::Value {
    // View structs contain only strings, numbers and lists.
    serde_json::to_value(view).unwrap_or(serde_json::Value::Null)
}
