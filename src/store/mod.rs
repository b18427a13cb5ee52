//! State store: the single authoritative snapshot of aggregated messages.
//!
//! Readers clone an `Arc<StateSnapshot>` and build views against it without
//! holding any lock. Writers are serialized by `writer` and publish a new
//! snapshot by swapping the `Arc` under a brief write lock, so a reader sees
//! either the old state or the new one, never a mix. No embedding call runs
//! while `writer` is held.

pub mod snapshot;

pub use snapshot::{CategoryIndex, ChatIndex, ChatLimits, StateSnapshot};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::classifier::Classifier;
use crate::ingest::ChatThread;
use crate::model::{ClassificationResult, Message};
use snapshot::EmailState;

/// Outcome of [`StateStore::replace_messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    /// Messages stored.
    pub count: usize,
    /// Distinct subjects after collapsing duplicates.
    pub unique_subjects: usize,
    /// Messages whose subject collided with an earlier one.
    pub collapsed: usize,
}

/// Passes attempted before giving up when messages keep changing underneath.
pub const CLASSIFY_ATTEMPTS: usize = 3;

/// Outcome of a full classification pass.
#[derive(Debug, Clone)]
pub struct ClassificationPass {
    pub index: CategoryIndex,
    pub results: Vec<ClassificationResult>,
    /// False when every attempt was overtaken by a message replacement.
    pub committed: bool,
}

impl ClassificationPass {
    pub fn degraded_count(&self) -> usize {
        self.results.iter().filter(|r| r.degraded).count()
    }
}

fn build_index(results: &[ClassificationResult]) -> CategoryIndex {
    let mut index = CategoryIndex::new();
    for result in results {
        index
            .entry(result.category.clone())
            .or_default()
            .push(result.key.clone());
    }
    index
}

/// Shared mutable state with single-writer exclusion.
#[derive(Debug)]
pub struct StateStore {
    current: RwLock<Arc<StateSnapshot>>,
    writer: Mutex<()>,
}

impl StateStore {
    pub fn new(limits: ChatLimits) -> Self {
        Self {
            current: RwLock::new(Arc::new(StateSnapshot::empty(limits))),
            writer: Mutex::new(()),
        }
    }

    /// The current snapshot. Cheap; never blocks on in-flight classification.
    pub async fn snapshot(&self) -> Arc<StateSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    async fn publish(&self, next: StateSnapshot) {
        *self.current.write().await = Arc::new(next);
    }

    /// Rebuild messages, subject index and unread set from `messages`.
    ///
    /// The new indices are built completely before the swap. Callers must
    /// only invoke this with a fully fetched and normalized batch.
    pub async fn replace_messages(&self, messages: Vec<Message>) -> ReplaceOutcome {
        let state = EmailState::build(messages);
        let outcome = ReplaceOutcome {
            count: state.messages.len(),
            unique_subjects: state.subjects.len(),
            collapsed: state.collapsed,
        };

        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot().await).clone();
        next.apply_email_state(state);
        self.publish(next).await;

        tracing::info!(
            count = outcome.count,
            unique_subjects = outcome.unique_subjects,
            collapsed = outcome.collapsed,
            "Replaced message snapshot"
        );
        outcome
    }

    /// Classify every current subject and rebuild the category index from
    /// empty.
    ///
    /// Subjects are copied out of the current snapshot and embedded with no
    /// lock held. The writer lock is taken only to commit, and only if no
    /// `replace_messages` landed in between; otherwise the pass is rerun
    /// against the new subject set, up to [`CLASSIFY_ATTEMPTS`] times.
    pub async fn classify_all(&self, classifier: &Classifier) -> ClassificationPass {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (generation, subjects) = {
                let snapshot = self.snapshot().await;
                (snapshot.generation(), snapshot.subjects().to_vec())
            };

            let results = classifier.classify_batch(&subjects).await;
            let index = build_index(&results);

            let _writer = self.writer.lock().await;
            let current = self.snapshot().await;
            if current.generation() != generation {
                tracing::warn!(
                    attempt,
                    expected = generation,
                    found = current.generation(),
                    "Messages replaced during classification"
                );
                if attempt < CLASSIFY_ATTEMPTS {
                    continue;
                }
                return ClassificationPass {
                    index,
                    results,
                    committed: false,
                };
            }

            let mut next = (*current).clone();
            next.set_category_index(index.clone());
            self.publish(next).await;

            let pass = ClassificationPass {
                index,
                results,
                committed: true,
            };
            tracing::info!(
                subjects = subjects.len(),
                categories = pass.index.len(),
                degraded = pass.degraded_count(),
                "Classification pass committed"
            );
            return pass;
        }
    }

    /// Insert or overwrite one chat's bounded message list.
    pub async fn record_chat_messages(&self, thread: ChatThread) {
        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot().await).clone();
        tracing::debug!(chat = %thread.chat_name, messages = thread.messages.len(), "Recording chat");
        next.chat_index_mut().record(thread);
        self.publish(next).await;
    }

    /// Replace the whole chat index with a fresh sync result.
    pub async fn replace_chats(&self, threads: Vec<ChatThread>) -> usize {
        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot().await).clone();
        next.chat_index_mut().replace(threads);
        let stored = next.chat_index().len();
        self.publish(next).await;
        tracing::info!(chats = stored, "Replaced chat index");
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::model::{FALLBACK_CATEGORY, Source};
    use crate::taxonomy::EmbeddedTaxonomy;
    use crate::taxonomy::test_support::KeywordEmbedder;

    const TABLE: &[(&str, &str)] = &[
        ("Security/Notifications", "login alerts, password resets"),
        ("Promotions/Offers", "sales, discounts"),
        (FALLBACK_CATEGORY, "anything else"),
    ];

    async fn classifier() -> Classifier {
        let embedder = Arc::new(KeywordEmbedder::new(vec!["password", "login", "sale"]));
        let taxonomy = EmbeddedTaxonomy::build(TABLE, embedder).await.unwrap();
        Classifier::new(Arc::new(taxonomy), Duration::from_secs(5))
    }

    /// Embeds any subject containing "slow" after `delay`.
    async fn slow_classifier(delay: Duration) -> Arc<Classifier> {
        let embedder = Arc::new(
            KeywordEmbedder::new(vec!["password", "login", "sale"]).slow_on("slow", delay),
        );
        let taxonomy = EmbeddedTaxonomy::build(TABLE, embedder).await.unwrap();
        Arc::new(Classifier::new(Arc::new(taxonomy), Duration::from_secs(5)))
    }

    fn email(subject: &str, body: &str, unread: bool) -> Message {
        Message {
            id: Message::derive_id(Source::Email, "a@x.com", subject, body),
            source: Source::Email,
            sender: "a@x.com".into(),
            subject: subject.into(),
            body: body.into(),
            unread,
            chat_id: None,
        }
    }

    #[tokio::test]
    async fn replace_swaps_everything() {
        let store = StateStore::new(ChatLimits::default());
        store
            .replace_messages(vec![email("S1", "B1", true), email("S2", "B2", false)])
            .await;
        let outcome = store.replace_messages(vec![email("S3", "B3", false)]).await;
        assert_eq!(outcome.count, 1);

        let snap = store.snapshot().await;
        assert_eq!(snap.subjects(), ["S3".to_string()]);
        assert!(snap.unread_set().is_empty());
        assert_eq!(snap.messages().len(), 1);
        assert_eq!(snap.generation(), 2);
    }

    #[tokio::test]
    async fn old_snapshot_is_unaffected_by_later_writes() {
        let store = StateStore::new(ChatLimits::default());
        store.replace_messages(vec![email("S1", "B1", true)]).await;
        let before = store.snapshot().await;

        store.replace_messages(vec![email("S2", "B2", false)]).await;
        assert_eq!(before.body("S1"), Some("B1"));
        assert!(before.is_unread("S1"));
        assert_eq!(store.snapshot().await.body("S1"), None);
    }

    #[tokio::test]
    async fn classify_all_is_idempotent() {
        let store = StateStore::new(ChatLimits::default());
        store
            .replace_messages(vec![
                email("Reset your password", "b", true),
                email("Weekend sale", "b", false),
                email("Lunch?", "b", false),
            ])
            .await;
        let classifier = classifier().await;

        let first = store.classify_all(&classifier).await;
        let first_json = serde_json::to_string(store.snapshot().await.category_index()).unwrap();
        let second = store.classify_all(&classifier).await;
        let second_json = serde_json::to_string(store.snapshot().await.category_index()).unwrap();

        assert_eq!(first.index, second.index);
        assert_eq!(first_json, second_json);
        let total: usize = second.index.values().map(Vec::len).sum();
        assert_eq!(total, 3);
        assert_eq!(second.index["Security/Notifications"], vec!["Reset your password"]);
        assert_eq!(second.index[FALLBACK_CATEGORY], vec!["Lunch?"]);
    }

    #[tokio::test]
    async fn classify_covers_only_current_subjects() {
        let store = StateStore::new(ChatLimits::default());
        let classifier = classifier().await;
        store.replace_messages(vec![email("Login alert", "b", false)]).await;
        store.classify_all(&classifier).await;

        store.replace_messages(vec![email("Mega sale", "b", false)]).await;
        assert!(store.snapshot().await.category_index().is_empty());

        let pass = store.classify_all(&classifier).await;
        assert_eq!(pass.index.len(), 1);
        assert_eq!(pass.index["Promotions/Offers"], vec!["Mega sale"]);
    }

    #[tokio::test]
    async fn concurrent_classify_passes_do_not_duplicate() {
        let store = Arc::new(StateStore::new(ChatLimits::default()));
        store
            .replace_messages(vec![email("A", "1", false), email("B", "2", false)])
            .await;
        let classifier = classifier().await;

        let (a, b) = tokio::join!(store.classify_all(&classifier), store.classify_all(&classifier));
        assert_eq!(a.index, b.index);
        let snap = store.snapshot().await;
        assert_eq!(snap.category_index()[FALLBACK_CATEGORY], vec!["A", "B"]);
    }

    #[tokio::test]
    async fn chat_recording_is_independent_of_email_state() {
        let store = StateStore::new(ChatLimits {
            max_chats: 2,
            max_messages_per_chat: 2,
        });
        store.replace_messages(vec![email("S1", "B1", true)]).await;
        store
            .record_chat_messages(ChatThread {
                chat_name: "Alice".into(),
                messages: vec!["a".into(), "b".into(), "c".into()],
            })
            .await;

        let snap = store.snapshot().await;
        assert_eq!(snap.chat_index().get("Alice").unwrap().messages, vec!["b", "c"]);
        assert_eq!(snap.body("S1"), Some("B1"));
        assert_eq!(snap.generation(), 1);
    }

    #[tokio::test]
    async fn replace_chats_drops_previous_threads() {
        let store = StateStore::new(ChatLimits::default());
        store
            .record_chat_messages(ChatThread {
                chat_name: "Old".into(),
                messages: vec!["x".into()],
            })
            .await;
        let stored = store
            .replace_chats(vec![ChatThread {
                chat_name: "New".into(),
                messages: vec!["y".into()],
            }])
            .await;
        assert_eq!(stored, 1);
        let snap = store.snapshot().await;
        assert!(snap.chat_index().get("Old").is_none());
        assert!(snap.chat_index().get("New").is_some());
    }

    #[tokio::test]
    async fn writes_do_not_wait_for_embedding() {
        let store = Arc::new(StateStore::new(ChatLimits::default()));
        store
            .replace_messages((1..=4).map(|i| email(&format!("slow {i}"), "b", false)).collect())
            .await;
        let classifier = slow_classifier(Duration::from_millis(300)).await;

        let pass = tokio::spawn({
            let store = Arc::clone(&store);
            let classifier = Arc::clone(&classifier);
            async move { store.classify_all(&classifier).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = tokio::time::Instant::now();
        store
            .record_chat_messages(ChatThread {
                chat_name: "Alice".into(),
                messages: vec!["hi".into()],
            })
            .await;
        let waited = start.elapsed();
        assert!(waited < Duration::from_millis(200), "chat write waited {waited:?}");

        let pass = pass.await.unwrap();
        assert!(pass.committed);
        let snap = store.snapshot().await;
        assert_eq!(snap.category_index()[FALLBACK_CATEGORY].len(), 4);
        assert!(snap.chat_index().get("Alice").is_some());
    }

    #[tokio::test]
    async fn replacement_during_pass_is_reclassified() {
        let store = Arc::new(StateStore::new(ChatLimits::default()));
        store.replace_messages(vec![email("slow digest", "b", false)]).await;
        let classifier = slow_classifier(Duration::from_millis(300)).await;

        let pass = tokio::spawn({
            let store = Arc::clone(&store);
            let classifier = Arc::clone(&classifier);
            async move { store.classify_all(&classifier).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = tokio::time::Instant::now();
        store.replace_messages(vec![email("Login alert", "b", true)]).await;
        assert!(start.elapsed() < Duration::from_millis(200));

        let pass = pass.await.unwrap();
        assert!(pass.committed);
        let snap = store.snapshot().await;
        assert_eq!(snap.category_index().len(), 1);
        assert_eq!(snap.category_index()["Security/Notifications"], vec!["Login alert"]);
    }
}
