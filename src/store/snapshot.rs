//! The aggregated state: messages, derived indices, and chat threads.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::ingest::ChatThread;
use crate::model::Message;

/// Category name → subjects, in classification order.
///
/// Keyed by a `BTreeMap` so serialization is byte-stable across passes.
pub type CategoryIndex = BTreeMap<String, Vec<String>>;

/// Bounds applied to the chat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLimits {
    pub max_chats: usize,
    pub max_messages_per_chat: usize,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_chats: 5,
            max_messages_per_chat: 3,
        }
    }
}

/// Bounded chat name → messages (oldest first).
///
/// Threads are kept least-recently-recorded first; recording a new chat at
/// capacity evicts the front.
#[derive(Debug, Clone, Default)]
pub struct ChatIndex {
    limits: ChatLimits,
    threads: Vec<ChatThread>,
}

impl ChatIndex {
    pub fn new(limits: ChatLimits) -> Self {
        Self {
            limits,
            threads: Vec::new(),
        }
    }

    pub fn limits(&self) -> ChatLimits {
        self.limits
    }

    /// Insert or overwrite one chat.
    pub fn record(&mut self, thread: ChatThread) {
        if self.limits.max_chats == 0 {
            return;
        }
        let thread = self.bounded(thread);
        if let Some(pos) = self.threads.iter().position(|t| t.chat_name == thread.chat_name) {
            self.threads.remove(pos);
        } else if self.threads.len() >= self.limits.max_chats {
            let evicted = self.threads.remove(0);
            tracing::debug!(chat = %evicted.chat_name, "Evicted chat from index");
        }
        self.threads.push(thread);
    }

    /// Replace every chat with a fresh sync result, keeping the first
    /// `max_chats` in the given order. Later duplicates of a name win.
    pub fn replace(&mut self, threads: Vec<ChatThread>) {
        self.threads.clear();
        for thread in threads {
            if let Some(pos) = self.threads.iter().position(|t| t.chat_name == thread.chat_name) {
                self.threads[pos] = self.bounded(thread);
            } else if self.threads.len() < self.limits.max_chats {
                let thread = self.bounded(thread);
                self.threads.push(thread);
            }
        }
    }

    pub fn get(&self, chat_name: &str) -> Option<&ChatThread> {
        self.threads.iter().find(|t| t.chat_name == chat_name)
    }

    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.threads.iter().map(|t| t.chat_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn message_count(&self) -> usize {
        self.threads.iter().map(|t| t.messages.len()).sum()
    }

    fn bounded(&self, mut thread: ChatThread) -> ChatThread {
        let max = self.limits.max_messages_per_chat;
        if thread.messages.len() > max {
            let excess = thread.messages.len() - max;
            thread.messages.drain(..excess);
        }
        thread
    }
}

/// Consistent view of all aggregated state at one point in time.
///
/// Fields are private; the store hands out `Arc<StateSnapshot>` so readers
/// can never mutate shared state.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    generation: u64,
    fetched_at: Option<DateTime<Utc>>,
    messages: Vec<Message>,
    subject_to_body: BTreeMap<String, String>,
    /// Unique subjects in first-seen order.
    subjects: Vec<String>,
    senders: BTreeMap<String, String>,
    unread_set: BTreeSet<String>,
    category_index: CategoryIndex,
    chat_index: ChatIndex,
}

/// Email-side indices derived from one batch of messages.
#[derive(Debug)]
pub(crate) struct EmailState {
    pub messages: Vec<Message>,
    pub subject_to_body: BTreeMap<String, String>,
    pub subjects: Vec<String>,
    pub senders: BTreeMap<String, String>,
    pub unread_set: BTreeSet<String>,
    /// Messages whose subject duplicated an earlier one.
    pub collapsed: usize,
}

impl EmailState {
    /// Build all subject-keyed indices. A repeated subject keeps its first
    /// position and takes the last body and sender seen.
    pub fn build(messages: Vec<Message>) -> Self {
        let mut subject_to_body = BTreeMap::new();
        let mut senders = BTreeMap::new();
        let mut subjects = Vec::new();
        let mut unread_set = BTreeSet::new();
        let mut collapsed = 0;

        for msg in &messages {
            if subject_to_body
                .insert(msg.subject.clone(), msg.body.clone())
                .is_some()
            {
                collapsed += 1;
                tracing::debug!(subject = %msg.subject, "Duplicate subject collapsed into one entry");
            } else {
                subjects.push(msg.subject.clone());
            }
            senders.insert(msg.subject.clone(), msg.sender.clone());
            if msg.unread {
                unread_set.insert(msg.subject.clone());
            }
        }

        Self {
            messages,
            subject_to_body,
            subjects,
            senders,
            unread_set,
            collapsed,
        }
    }
}

impl StateSnapshot {
    pub(crate) fn empty(limits: ChatLimits) -> Self {
        Self {
            chat_index: ChatIndex::new(limits),
            ..Default::default()
        }
    }

    /// Swap in new email state. The category index is cleared because it
    /// described the previous subject set.
    pub(crate) fn apply_email_state(&mut self, state: EmailState) {
        self.generation += 1;
        self.fetched_at = Some(Utc::now());
        self.messages = state.messages;
        self.subject_to_body = state.subject_to_body;
        self.subjects = state.subjects;
        self.senders = state.senders;
        self.unread_set = state.unread_set;
        self.category_index.clear();
    }

    pub(crate) fn set_category_index(&mut self, index: CategoryIndex) {
        self.category_index = index;
    }

    pub(crate) fn chat_index_mut(&mut self) -> &mut ChatIndex {
        &mut self.chat_index
    }

    /// Bumped by every successful message replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn subject_to_body(&self) -> &BTreeMap<String, String> {
        &self.subject_to_body
    }

    pub fn body(&self, subject: &str) -> Option<&str> {
        self.subject_to_body.get(subject).map(String::as_str)
    }

    /// Unique subjects in first-seen order.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn sender(&self, subject: &str) -> Option<&str> {
        self.senders.get(subject).map(String::as_str)
    }

    pub fn unread_set(&self) -> &BTreeSet<String> {
        &self.unread_set
    }

    pub fn is_unread(&self, subject: &str) -> bool {
        self.unread_set.contains(subject)
    }

    pub fn category_index(&self) -> &CategoryIndex {
        &self.category_index
    }

    pub fn chat_index(&self) -> &ChatIndex {
        &self.chat_index
    }
}
