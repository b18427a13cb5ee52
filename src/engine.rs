//! The engine: one state store plus the services that feed and read it.
//!
//! Every tool handler holds an `Arc<Engine>`. Provider and completion calls
//! run outside all store locks; a failed or timed-out fetch commits nothing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::ingest;
use crate::llm::prompts::{self, ReplyMedium, Sampling};
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::model::ClassificationResult;
use crate::providers::{ChatProvider, EmailProvider};
use crate::store::{ClassificationPass, ReplaceOutcome, StateSnapshot, StateStore};
use crate::taxonomy::EmbeddedTaxonomy;
use crate::views::{ContextAssembler, ResourceDescriptor};

/// Keys bundled into an `ask` prompt when the caller names none.
pub const DEFAULT_ASK_KEYS: &[&str] = &["email://summary", "telegram://summary"];

pub struct Engine {
    config: EngineConfig,
    store: Arc<StateStore>,
    classifier: Classifier,
    assembler: ContextAssembler,
    email: Option<Arc<dyn EmailProvider>>,
    chat: Option<Arc<dyn ChatProvider>>,
    llm: Option<Arc<dyn CompletionProvider>>,
    sampling: Sampling,
}

impl Engine {
    /// Build an engine around an already-embedded taxonomy.
    pub fn new(config: EngineConfig, taxonomy: Arc<EmbeddedTaxonomy>) -> Self {
        let assembler =
            ContextAssembler::new(&config, taxonomy.names().map(str::to_string).collect());
        Self {
            store: Arc::new(StateStore::new(config.chat_limits())),
            classifier: Classifier::new(taxonomy, config.embedding_timeout),
            assembler,
            email: None,
            chat: None,
            llm: None,
            sampling: Sampling {
                max_tokens: crate::llm::LlmConfig::DEFAULT_MAX_TOKENS,
                temperature: crate::llm::LlmConfig::DEFAULT_TEMPERATURE,
            },
            config,
        }
    }

    pub fn with_email_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email = Some(provider);
        self
    }

    pub fn with_chat_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.chat = Some(provider);
        self
    }

    pub fn with_completion(mut self, llm: Arc<dyn CompletionProvider>, sampling: Sampling) -> Self {
        self.llm = Some(llm);
        self.sampling = sampling;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub async fn snapshot(&self) -> Arc<StateSnapshot> {
        self.store.snapshot().await
    }

    // ── Email ingestion ─────────────────────────────────────────────

    /// Normalize raw email records and replace the stored messages.
    ///
    /// A malformed record fails the whole batch before the store is touched.
    pub async fn fetch_and_store(&self, records: &[Value]) -> Result<ReplaceOutcome> {
        let messages = ingest::normalize_emails(records).inspect_err(|e| {
            tracing::error!(error = %e, records = records.len(), "Rejected email batch");
        })?;
        Ok(self.store.replace_messages(messages).await)
    }

    /// Fetch the latest emails from the configured provider and store them.
    pub async fn sync_emails(&self) -> Result<ReplaceOutcome> {
        let provider = self.email_provider()?;
        let records = self
            .bounded(
                "email fetch",
                self.config.fetch_timeout,
                provider.fetch_latest(self.config.fetch_limit),
            )
            .await?;
        self.fetch_and_store(&records).await
    }

    // ── Classification ──────────────────────────────────────────────

    pub async fn classify_all(&self) -> ClassificationPass {
        self.store.classify_all(&self.classifier).await
    }

    /// Classify a single subject without touching the store.
    pub async fn classify_subject(&self, subject: &str) -> ClassificationResult {
        self.classifier.classify(subject).await
    }

    // ── Views ───────────────────────────────────────────────────────

    pub async fn get_view(&self, resource_key: &str, limit: Option<usize>) -> Result<Value> {
        let snapshot = self.store.snapshot().await;
        Ok(self.assembler.resolve(&snapshot, resource_key, limit)?)
    }

    pub async fn list_resources(&self) -> Vec<ResourceDescriptor> {
        let snapshot = self.store.snapshot().await;
        self.assembler.list_resources(&snapshot)
    }

    // ── Chats ───────────────────────────────────────────────────────

    /// Insert or overwrite one chat's recent messages.
    pub async fn record_chat(&self, chat_name: &str, messages: Vec<String>) -> Result<()> {
        let thread = ingest::normalize_chat(0, chat_name, messages)?;
        self.store.record_chat_messages(thread).await;
        Ok(())
    }

    /// Fetch recent chats from the configured provider and replace the chat
    /// index. Returns the number of chats stored.
    pub async fn sync_chats(&self) -> Result<usize> {
        let provider = self.chat_provider()?;
        let limits = self.config.chat_limits();
        let records = self
            .bounded(
                "chat fetch",
                self.config.fetch_timeout,
                provider.fetch_chats(limits.max_chats, limits.max_messages_per_chat),
            )
            .await?;
        let threads = ingest::normalize_chats(&records)?;
        Ok(self.store.replace_chats(threads).await)
    }

    // ── Outbound ────────────────────────────────────────────────────

    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let provider = self.email_provider()?;
        self.bounded("email send", self.config.fetch_timeout, provider.send(to, subject, body))
            .await
    }

    pub async fn send_chat_message(&self, chat_name: &str, text: &str) -> Result<()> {
        let provider = self.chat_provider()?;
        self.bounded("chat send", self.config.fetch_timeout, provider.send(chat_name, text))
            .await
    }

    // ── Completion ──────────────────────────────────────────────────

    pub async fn summarize(&self, body: &str) -> Result<String> {
        self.complete(prompts::summarize(body, self.sampling)).await
    }

    /// Answer a question over the named views (default: the email and chat
    /// summaries). An unresolvable key fails the call before any completion.
    pub async fn ask(&self, question: &str, resource_keys: Option<&[String]>) -> Result<String> {
        let default_keys: Vec<String> = DEFAULT_ASK_KEYS.iter().map(|k| k.to_string()).collect();
        let keys = match resource_keys {
            Some(keys) if !keys.is_empty() => keys,
            _ => default_keys.as_slice(),
        };

        let snapshot = self.store.snapshot().await;
        let mut bundle = serde_json::Map::new();
        for key in keys {
            let view = self.assembler.resolve(&snapshot, key, None)?;
            bundle.insert(key.clone(), view);
        }
        drop(snapshot);

        let context = serde_json::to_string_pretty(&Value::Object(bundle))
            .unwrap_or_default();
        self.complete(prompts::ask(&context, question, self.sampling)).await
    }

    pub async fn draft_reply(&self, prompt: &str, medium: ReplyMedium) -> Result<String> {
        self.complete(prompts::draft_reply(prompt, medium, self.sampling)).await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::NotConfigured("completion service".into()))?;
        self.bounded("completion", self.config.completion_timeout, llm.complete(request))
            .await
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn email_provider(&self) -> Result<&Arc<dyn EmailProvider>> {
        self.email
            .as_ref()
            .ok_or_else(|| EngineError::NotConfigured("email provider".into()))
    }

    fn chat_provider(&self) -> Result<&Arc<dyn ChatProvider>> {
        self.chat
            .as_ref()
            .ok_or_else(|| EngineError::NotConfigured("chat provider".into()))
    }

    /// Run `fut` under `timeout`, converting its error into [`EngineError`].
    async fn bounded<T, E>(
        &self,
        operation: &str,
        timeout: Duration,
        fut: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        E: Into<EngineError>,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let e = e.into();
                tracing::error!(operation, error = %e, "Operation failed");
                Err(e)
            }
            Err(_) => {
                tracing::error!(operation, ?timeout, "Operation timed out");
                Err(EngineError::timeout(operation, timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::{ErrorKind, LlmError, ProviderError};
    use crate::model::FALLBACK_CATEGORY;
    use crate::taxonomy::test_support::KeywordEmbedder;

    const TABLE: &[(&str, &str)] = &[
        ("Security/Notifications", "login alerts, password resets"),
        (FALLBACK_CATEGORY, "anything else"),
    ];

    async fn engine() -> Engine {
        let embedder = Arc::new(KeywordEmbedder::new(vec!["password", "login"]));
        let taxonomy = EmbeddedTaxonomy::build(TABLE, embedder).await.unwrap();
        Engine::new(
            EngineConfig {
                fetch_timeout: Duration::from_millis(100),
                ..Default::default()
            },
            Arc::new(taxonomy),
        )
    }

    fn two_records() -> Vec<Value> {
        vec![
            json!({"from": "a@x.com", "subject": "S1", "body": "B1", "unread": true}),
            json!({"from": "b@y.com", "subject": "S2", "body": "B2", "unread": "false"}),
        ]
    }

    enum EmailBehavior {
        Records(Vec<Value>),
        Fail,
        Hang,
    }

    struct StubEmail {
        behavior: EmailBehavior,
        sent: Mutex<Vec<(String, String, String)>>,
    }

    impl StubEmail {
        fn new(behavior: EmailBehavior) -> Self {
            Self {
                behavior,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmailProvider for StubEmail {
        fn name(&self) -> &str {
            "stub-email"
        }

        async fn fetch_latest(&self, limit: usize) -> std::result::Result<Vec<Value>, ProviderError> {
            match &self.behavior {
                EmailBehavior::Records(records) => Ok(records.iter().take(limit).cloned().collect()),
                EmailBehavior::Fail => Err(ProviderError::FetchFailed {
                    name: "stub-email".into(),
                    reason: "connection refused".into(),
                }),
                EmailBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn send(&self, to: &str, subject: &str, body: &str) -> std::result::Result<(), ProviderError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.into(), subject.into(), body.into()));
            Ok(())
        }
    }

    struct StubChat;

    #[async_trait]
    impl ChatProvider for StubChat {
        fn name(&self) -> &str {
            "stub-chat"
        }

        async fn fetch_chats(
            &self,
            _max_chats: usize,
            _max_messages: usize,
        ) -> std::result::Result<Vec<Value>, ProviderError> {
            Ok(vec![
                json!({"chat_name": "Alice", "messages": ["hi", "how are you", "see you", "bye"]}),
                json!({"chat_name": "Team", "messages": ["standup at 10"]}),
            ])
        }

        async fn send(&self, chat_name: &str, _text: &str) -> std::result::Result<(), ProviderError> {
            if chat_name == "Alice" {
                Ok(())
            } else {
                Err(ProviderError::UnknownRecipient {
                    name: "stub-chat".into(),
                    recipient: chat_name.into(),
                })
            }
        }
    }

    /// Echoes the user prompt so tests can inspect what was sent.
    struct EchoLlm;

    #[async_trait]
    impl CompletionProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> std::result::Result<String, LlmError> {
            Ok(request.user)
        }
    }

    fn sampling() -> Sampling {
        Sampling {
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn two_record_example_end_to_end() {
        let engine = engine().await;
        let outcome = engine.fetch_and_store(&two_records()).await.unwrap();
        assert_eq!(outcome.count, 2);

        let snap = engine.snapshot().await;
        assert_eq!(snap.subject_to_body().len(), 2);
        assert_eq!(snap.body("S1"), Some("B1"));
        assert_eq!(snap.body("S2"), Some("B2"));
        assert_eq!(snap.unread_set().iter().collect::<Vec<_>>(), vec!["S1"]);

        let first = engine.classify_all().await;
        assert_eq!(first.index.len(), 1);
        assert_eq!(first.index[FALLBACK_CATEGORY], vec!["S1", "S2"]);
        let second = engine.classify_all().await;
        assert_eq!(first.index, second.index);
    }

    #[tokio::test]
    async fn failing_fetch_leaves_state_unchanged() {
        let engine = engine()
            .await
            .with_email_provider(Arc::new(StubEmail::new(EmailBehavior::Fail)));
        engine.fetch_and_store(&two_records()).await.unwrap();
        let before = engine.snapshot().await;

        let err = engine.sync_emails().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);

        let after = engine.snapshot().await;
        assert_eq!(after.subject_to_body(), before.subject_to_body());
        assert_eq!(after.unread_set(), before.unread_set());
        assert_eq!(after.messages(), before.messages());
        assert_eq!(after.generation(), before.generation());
    }

    #[tokio::test]
    async fn fetch_timeout_is_distinct_and_commits_nothing() {
        let engine = engine()
            .await
            .with_email_provider(Arc::new(StubEmail::new(EmailBehavior::Hang)));
        engine.fetch_and_store(&two_records()).await.unwrap();

        let err = engine.sync_emails().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
        assert_eq!(engine.snapshot().await.messages().len(), 2);
    }

    #[tokio::test]
    async fn malformed_batch_is_rejected_whole() {
        let engine = engine().await;
        engine.fetch_and_store(&two_records()).await.unwrap();

        let bad = vec![
            json!({"subject": "ok", "body": "fine"}),
            json!({"subject": 7}),
        ];
        let err = engine.fetch_and_store(&bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRecord);
        assert_eq!(engine.snapshot().await.body("S1"), Some("B1"));
    }

    #[tokio::test]
    async fn sync_emails_stores_provider_records() {
        let engine = engine()
            .await
            .with_email_provider(Arc::new(StubEmail::new(EmailBehavior::Records(two_records()))));
        let outcome = engine.sync_emails().await.unwrap();
        assert_eq!(outcome.count, 2);
        let view = engine.get_view("email://unread", None).await.unwrap();
        assert_eq!(view["total_count"], 1);
        assert_eq!(view["items"][0]["subject"], "S1");
    }

    #[tokio::test]
    async fn missing_provider_is_not_configured() {
        let engine = engine().await;
        assert_eq!(engine.sync_emails().await.unwrap_err().kind(), ErrorKind::NotConfigured);
        assert_eq!(engine.sync_chats().await.unwrap_err().kind(), ErrorKind::NotConfigured);
        assert_eq!(engine.summarize("x").await.unwrap_err().kind(), ErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn views_after_classification() {
        let engine = engine().await;
        engine
            .fetch_and_store(&[
                json!({"from": "sec@bank.com", "subject": "Your password reset code", "body": "123456", "unread": true}),
                json!({"from": "friend@x.com", "subject": "Lunch", "body": "Tomorrow?", "unread": false}),
            ])
            .await
            .unwrap();

        assert!(matches!(
            engine.get_view("email://category/Security/Notifications", None).await,
            Ok(ref v) if v["total_count"] == 0
        ));

        engine.classify_all().await;
        let view = engine
            .get_view("email://category/Security/Notifications", Some(5))
            .await
            .unwrap();
        assert_eq!(view["total_count"], 1);
        assert_eq!(view["items"][0]["sender"], "sec@bank.com");
        assert_eq!(view["items"][0]["is_unread"], true);

        let err = engine.get_view("email://category/Nope", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ViewNotFound);
    }

    #[tokio::test]
    async fn chats_record_and_sync() {
        let engine = engine().await.with_chat_provider(Arc::new(StubChat));
        engine
            .record_chat("Bob", vec!["yo".into()])
            .await
            .unwrap();
        assert!(engine.record_chat("  ", vec![]).await.is_err());

        let stored = engine.sync_chats().await.unwrap();
        assert_eq!(stored, 2);

        let view = engine.get_view("telegram://chat/Alice", None).await.unwrap();
        assert_eq!(view["total_count"], 3);
        assert_eq!(view["items"], json!(["how are you", "see you", "bye"]));
        assert!(engine.get_view("telegram://chat/Bob", None).await.is_err());

        engine.send_chat_message("Alice", "hello").await.unwrap();
        let err = engine.send_chat_message("Carol", "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[tokio::test]
    async fn ask_bundles_requested_views() {
        let engine = engine().await.with_completion(Arc::new(EchoLlm), sampling());
        engine.fetch_and_store(&two_records()).await.unwrap();

        let answer = engine.ask("How many unread?", None).await.unwrap();
        assert!(answer.contains("email://summary"));
        assert!(answer.contains("telegram://summary"));
        assert!(answer.ends_with("Question:\nHow many unread?"));

        let keys = vec!["email://unread".to_string()];
        let answer = engine.ask("Which?", Some(&keys)).await.unwrap();
        assert!(answer.contains("\"S1\""));
        assert!(!answer.contains("telegram://summary"));

        let bad = vec!["email://bogus".to_string()];
        let err = engine.ask("?", Some(&bad)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ViewNotFound);
    }

    #[tokio::test]
    async fn send_email_goes_through_provider() {
        let stub = Arc::new(StubEmail::new(EmailBehavior::Records(Vec::new())));
        let engine = engine().await.with_email_provider(stub.clone());
        engine.send_email("a@x.com", "Hi", "Body").await.unwrap();
        assert_eq!(
            stub.sent.lock().unwrap().as_slice(),
            &[("a@x.com".to_string(), "Hi".to_string(), "Body".to_string())]
        );
    }

    #[tokio::test]
    async fn classify_subject_does_not_touch_store() {
        let engine = engine().await;
        let result = engine.classify_subject("Your password reset code").await;
        assert_eq!(result.category, "Security/Notifications");
        assert!(engine.snapshot().await.category_index().is_empty());
    }
}
