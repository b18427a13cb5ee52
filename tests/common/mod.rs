//! Shared stubs for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use unified_inbox::config::EngineConfig;
use unified_inbox::embedding::Embedder;
use unified_inbox::engine::Engine;
use unified_inbox::error::EmbeddingError;
use unified_inbox::model::FALLBACK_CATEGORY;
use unified_inbox::taxonomy::EmbeddedTaxonomy;

/// The two-entry table used throughout the examples.
pub const TWO_ENTRY: &[(&str, &str)] = &[
    ("Security/Notifications", "login alerts and password resets"),
    (FALLBACK_CATEGORY, "anything else"),
];

/// One dimension per keyword plus a catch-all hit when nothing matches.
/// Counts calls so tests can assert the embedder was skipped.
pub struct StubEmbedder {
    keywords: Vec<&'static str>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        let hit = vector.iter().any(|v| *v > 0.0);
        vector.push(if hit { 0.0 } else { 1.0 });
        Ok(vector)
    }
}

pub async fn taxonomy(
    table: &[(&str, &str)],
    embedder: Arc<StubEmbedder>,
) -> Arc<EmbeddedTaxonomy> {
    Arc::new(EmbeddedTaxonomy::build(table, embedder).await.unwrap())
}

pub async fn engine(table: &[(&str, &str)], keywords: &[&'static str]) -> Engine {
    let taxonomy = taxonomy(table, Arc::new(StubEmbedder::new(keywords))).await;
    Engine::new(EngineConfig::default(), taxonomy)
}
