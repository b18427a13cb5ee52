//! Classifier: subject → [`ClassificationResult`], isolating failures per item.

use std::sync::Arc;
use std::time::Duration;

use crate::model::ClassificationResult;
use crate::taxonomy::EmbeddedTaxonomy;

/// Assigns categories using the embedded taxonomy.
///
/// An embedding error or timeout for one subject never propagates: that
/// subject gets the fallback category and the caller moves on.
#[derive(Debug, Clone)]
pub struct Classifier {
    taxonomy: Arc<EmbeddedTaxonomy>,
    embedding_timeout: Duration,
}

impl Classifier {
    pub fn new(taxonomy: Arc<EmbeddedTaxonomy>, embedding_timeout: Duration) -> Self {
        Self {
            taxonomy,
            embedding_timeout,
        }
    }

    pub fn taxonomy(&self) -> &EmbeddedTaxonomy {
        &self.taxonomy
    }

    /// Classify one subject.
    pub async fn classify(&self, subject: &str) -> ClassificationResult {
        match tokio::time::timeout(self.embedding_timeout, self.taxonomy.best_match(subject)).await
        {
            Ok(Ok(found)) => {
                tracing::debug!(subject, category = %found.name, "Classified subject");
                ClassificationResult {
                    key: subject.to_string(),
                    category: found.name,
                    similarity: found.similarity,
                    degraded: false,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(subject, error = %e, "Embedding failed; using fallback category");
                ClassificationResult::fallback(subject, true)
            }
            Err(_) => {
                tracing::warn!(
                    subject,
                    timeout = ?self.embedding_timeout,
                    "Embedding timed out; using fallback category"
                );
                ClassificationResult::fallback(subject, true)
            }
        }
    }

    /// Classify subjects in order, one result per input.
    pub async fn classify_batch(&self, subjects: &[String]) -> Vec<ClassificationResult> {
        let mut results = Vec::with_capacity(subjects.len());
        for subject in subjects {
            results.push(self.classify(subject).await);
        }
        results
    }
}
