//! Category embedding index: the fixed taxonomy plus one cached vector per
//! category.
//!
//! Built once at startup; immutable afterwards. Classification is a plain
//! argmax over cosine similarity with no rejection threshold, so every
//! non-empty input lands in its nearest category.

use std::collections::HashSet;
use std::sync::Arc;

use crate::embedding::{Embedder, cosine_similarity};
use crate::error::{EmbeddingError, TaxonomyError};
use crate::model::{CategoryDescriptor, FALLBACK_CATEGORY};

/// The fixed classification taxonomy, in tie-break order.
pub const DEFAULT_TAXONOMY: &[(&str, &str)] = &[
    (
        "Career/Jobs",
        "Job alerts, hiring, interview calls, internships, job opportunities, referrals",
    ),
    (
        "Social/Networking",
        "LinkedIn invites, connection requests, social notifications, community updates",
    ),
    (
        "Promotions/Offers",
        "Sales, coupons, discounts, promotional campaigns, cashbacks, special offers",
    ),
    (
        "Updates/Newsletters",
        "News digests, weekly newsletters, platform announcements, blog updates",
    ),
    (
        "Events/Reminders",
        "Event invites, webinars, calendar reminders, upcoming meetings",
    ),
    (
        "Security/Notifications",
        "Login alerts, password resets, suspicious logins, 2FA notifications",
    ),
    (
        "Finance/Transactions",
        "Bills, receipts, invoices, payment confirmations, bank alerts",
    ),
    (
        "Education/Learning",
        "Course updates, certifications, internship results, learning platforms",
    ),
    (
        "System/Automated",
        "System alerts, no-reply bot emails, monitoring logs, uptime/downtime notices",
    ),
    ("Verification", "verify, verification"),
    (
        "Competitive Programming",
        "Leetcode, Codechef, GfG, Codeforces",
    ),
    ("Shopping", "Order, order!, order"),
    (
        FALLBACK_CATEGORY,
        "Emails that don't match any of the above clearly",
    ),
];

/// Winning category for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub name: String,
    /// `None` when the input was blank and no embedding was computed.
    pub similarity: Option<f32>,
}

/// The taxonomy with precomputed category vectors.
pub struct EmbeddedTaxonomy {
    categories: Vec<CategoryDescriptor>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for EmbeddedTaxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedTaxonomy")
            .field("categories", &self.names().collect::<Vec<_>>())
            .field("embedder", &self.embedder.model_name())
            .finish()
    }
}

impl EmbeddedTaxonomy {
    /// Embed every description once.
    ///
    /// Fails if the table is empty, has duplicate names, lacks the fallback
    /// category, or the embedder returns vectors of differing dimensions.
    pub async fn build(
        table: &[(&str, &str)],
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, TaxonomyError> {
        if table.is_empty() {
            return Err(TaxonomyError::Empty);
        }
        let mut seen = HashSet::new();
        for (name, _) in table {
            if !seen.insert(*name) {
                return Err(TaxonomyError::DuplicateName(name.to_string()));
            }
        }
        if !seen.contains(FALLBACK_CATEGORY) {
            return Err(TaxonomyError::MissingFallback(FALLBACK_CATEGORY.to_string()));
        }

        let embeddings = futures::future::try_join_all(table.iter().map(|(name, description)| {
            let embedder = Arc::clone(&embedder);
            async move {
                embedder
                    .embed(description)
                    .await
                    .map_err(|source| TaxonomyError::Embedding {
                        name: name.to_string(),
                        source,
                    })
            }
        }))
        .await?;

        let expected = embeddings[0].len();
        let mut categories = Vec::with_capacity(table.len());
        for ((name, description), embedding) in table.iter().zip(embeddings) {
            if embedding.len() != expected {
                return Err(TaxonomyError::DimensionMismatch {
                    name: name.to_string(),
                    expected,
                    found: embedding.len(),
                });
            }
            categories.push(CategoryDescriptor {
                name: name.to_string(),
                description: description.to_string(),
                embedding,
            });
        }

        tracing::info!(
            categories = categories.len(),
            dims = expected,
            model = embedder.model_name(),
            "Category taxonomy embedded"
        );

        Ok(Self {
            categories,
            embedder,
        })
    }

    /// Category names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Nearest category name for `text`.
    pub async fn best_category(&self, text: &str) -> Result<String, EmbeddingError> {
        Ok(self.best_match(text).await?.name)
    }

    /// Nearest category and its similarity.
    ///
    /// Blank input short-circuits to the fallback without calling the
    /// embedder. Ties go to the category listed first.
    pub async fn best_match(&self, text: &str) -> Result<CategoryMatch, EmbeddingError> {
        if text.trim().is_empty() {
            return Ok(CategoryMatch {
                name: FALLBACK_CATEGORY.to_string(),
                similarity: None,
            });
        }

        let vector = self.embedder.embed(text).await?;
        let mut best: Option<(&CategoryDescriptor, f32)> = None;
        for category in &self.categories {
            let score = cosine_similarity(&vector, &category.embedding);
            // Strict comparison keeps the earlier entry on ties.
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((category, score));
            }
        }

        // `build` guarantees at least one category.
        let (category, score) = best.ok_or_else(|| {
            EmbeddingError::InvalidResponse("taxonomy has no categories".into())
        })?;
        Ok(CategoryMatch {
            name: category.name.clone(),
            similarity: Some(score),
        })
    }

    /// Similarity of `text` against every category, in table order.
    pub async fn score_all(&self, text: &str) -> Result<Vec<(String, f32)>, EmbeddingError> {
        let vector = self.embedder.embed(text).await?;
        Ok(self
            .categories
            .iter()
            .map(|c| (c.name.clone(), cosine_similarity(&vector, &c.embedding)))
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::KeywordEmbedder;
    use super::*;

    const TWO_ENTRY: &[(&str, &str)] = &[
        ("Security/Notifications", "login alerts, password resets"),
        ("Promotions/Offers", "sales, discounts"),
        (FALLBACK_CATEGORY, "anything else"),
    ];

    fn keyword_embedder() -> Arc<KeywordEmbedder> {
        Arc::new(KeywordEmbedder::new(vec![
            "login", "password", "reset", "sale", "discount",
        ]))
    }

    #[tokio::test]
    async fn blank_input_skips_embedder() {
        let embedder = keyword_embedder();
        let taxonomy = EmbeddedTaxonomy::build(TWO_ENTRY, embedder.clone()).await.unwrap();
        let after_build = embedder.call_count();

        assert_eq!(taxonomy.best_category("").await.unwrap(), FALLBACK_CATEGORY);
        assert_eq!(taxonomy.best_category("   ").await.unwrap(), FALLBACK_CATEGORY);
        assert_eq!(taxonomy.best_category("\t\n").await.unwrap(), FALLBACK_CATEGORY);
        assert_eq!(embedder.call_count(), after_build);
    }

    #[tokio::test]
    async fn password_reset_is_security() {
        let taxonomy = EmbeddedTaxonomy::build(TWO_ENTRY, keyword_embedder()).await.unwrap();
        let name = taxonomy.best_category("Your password reset code").await.unwrap();
        assert_eq!(name, "Security/Notifications");
        let name = taxonomy.best_category("Big summer sale, 50% discount").await.unwrap();
        assert_eq!(name, "Promotions/Offers");
    }

    #[tokio::test]
    async fn result_is_true_argmax() {
        let taxonomy = EmbeddedTaxonomy::build(TWO_ENTRY, keyword_embedder()).await.unwrap();
        for subject in ["Login from new device", "Discount inside", "Weekly digest", "reset"] {
            let chosen = taxonomy.best_match(subject).await.unwrap();
            let scores = taxonomy.score_all(subject).await.unwrap();
            let chosen_score = chosen.similarity.unwrap();
            assert!(scores.iter().all(|(_, s)| chosen_score >= *s), "{subject}");
        }
    }

    #[tokio::test]
    async fn classification_is_deterministic() {
        let taxonomy = EmbeddedTaxonomy::build(TWO_ENTRY, keyword_embedder()).await.unwrap();
        let first = taxonomy.best_category("suspicious login").await.unwrap();
        for _ in 0..5 {
            assert_eq!(taxonomy.best_category("suspicious login").await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn ties_go_to_earlier_entry() {
        let table: &[(&str, &str)] = &[("A", "a"), ("B", "b"), (FALLBACK_CATEGORY, "o")];
        let embedder = Arc::new(
            KeywordEmbedder::new(vec![])
                .with_vector("a", vec![1.0, 0.0])
                .with_vector("b", vec![1.0, 0.0])
                .with_vector("o", vec![0.0, 1.0])
                .with_vector("query", vec![1.0, 0.0]),
        );
        let taxonomy = EmbeddedTaxonomy::build(table, embedder).await.unwrap();
        assert_eq!(taxonomy.best_category("query").await.unwrap(), "A");
    }

    #[tokio::test]
    async fn default_taxonomy_has_thirteen_entries_with_fallback_last() {
        let taxonomy = EmbeddedTaxonomy::build(DEFAULT_TAXONOMY, keyword_embedder())
            .await
            .unwrap();
        let names: Vec<&str> = taxonomy.names().collect();
        assert_eq!(names.len(), 13);
        assert_eq!(names[0], "Career/Jobs");
        assert_eq!(names[10], "Competitive Programming");
        assert_eq!(*names.last().unwrap(), FALLBACK_CATEGORY);
    }

    #[tokio::test]
    async fn build_rejects_bad_tables() {
        let empty: &[(&str, &str)] = &[];
        assert!(matches!(
            EmbeddedTaxonomy::build(empty, keyword_embedder()).await,
            Err(TaxonomyError::Empty)
        ));

        let dup: &[(&str, &str)] = &[("A", "x"), ("A", "y"), (FALLBACK_CATEGORY, "z")];
        assert!(matches!(
            EmbeddedTaxonomy::build(dup, keyword_embedder()).await,
            Err(TaxonomyError::DuplicateName(_))
        ));

        let no_fallback: &[(&str, &str)] = &[("A", "x")];
        assert!(matches!(
            EmbeddedTaxonomy::build(no_fallback, keyword_embedder()).await,
            Err(TaxonomyError::MissingFallback(_))
        ));
    }

    #[tokio::test]
    async fn build_fails_when_description_embedding_fails() {
        let embedder = Arc::new(KeywordEmbedder::new(vec!["sale"]).failing_on("sales"));
        let err = EmbeddedTaxonomy::build(TWO_ENTRY, embedder).await.unwrap_err();
        assert!(matches!(err, TaxonomyError::Embedding { ref name, .. } if name == "Promotions/Offers"));
    }
}
