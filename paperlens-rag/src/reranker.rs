//! Cross-encoder re-ranking of retrieval candidates.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::document::Candidate;
use crate::error::{RagError, Result};

/// A pairwise relevance model: scores each passage jointly with the query.
///
/// Implementations return exactly one score per passage, in input order.
/// Higher is more relevant.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;

    /// Identifier of the underlying model, reported by the health check.
    fn model_name(&self) -> &str;
}

/// Re-orders candidates by cross-encoder score.
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker").field("model", &self.scorer.model_name()).finish()
    }
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    pub fn model_name(&self) -> &str {
        self.scorer.model_name()
    }

    /// Score every candidate against `query` and sort by descending
    /// `rerank_score`.
    ///
    /// The passage for each candidate is `"{title}. {abstract}"`. The sort is
    /// stable, so candidates with equal scores keep their incoming order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RerankerError`] if the scorer fails or returns a
    /// different number of scores than candidates.
    pub async fn rerank(&self, query: &str, mut candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let passages: Vec<String> = candidates.iter().map(|c| c.document.rerank_text()).collect();
        let passage_refs: Vec<&str> = passages.iter().map(String::as_str).collect();
        let scores = self.scorer.score(query, &passage_refs).await?;

        if scores.len() != candidates.len() {
            return Err(RagError::RerankerError {
                reranker: self.model_name().to_string(),
                message: format!("expected {} scores, got {}", candidates.len(), scores.len()),
            });
        }

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }
        candidates.sort_by(|a, b| b.final_score().total_cmp(&a.final_score()));

        debug!(model = self.model_name(), candidates = candidates.len(), "reranked");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Document;

    struct TableScorer {
        scores: HashMap<String, f32>,
    }

    #[async_trait]
    impl RelevanceScorer for TableScorer {
        async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
            Ok(passages.iter().map(|p| self.scores.get(*p).copied().unwrap_or(0.0)).collect())
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    struct ShortScorer;

    #[async_trait]
    impl RelevanceScorer for ShortScorer {
        async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    fn candidate(id: &str, rank: usize) -> Candidate {
        Candidate {
            id: id.into(),
            document: Arc::new(Document {
                id: id.into(),
                title: id.to_uppercase(),
                abstract_text: format!("about {id}"),
                ..Default::default()
            }),
            initial_score: 1.0 - rank as f32 * 0.1,
            rerank_score: None,
            retrieval_rank: rank,
        }
    }

    #[tokio::test]
    async fn sorts_by_rerank_score() {
        let scorer = TableScorer {
            scores: HashMap::from([("A. about a".into(), 0.2), ("B. about b".into(), 0.9)]),
        };
        let reranker = Reranker::new(Arc::new(scorer));
        let out = reranker.rerank("q", vec![candidate("a", 0), candidate("b", 1)]).await.unwrap();

        assert_eq!(out[0].id, "b");
        assert_eq!(out[0].rerank_score, Some(0.9));
        assert_eq!(out[1].id, "a");
    }

    #[tokio::test]
    async fn equal_scores_keep_incoming_order() {
        let reranker = Reranker::new(Arc::new(TableScorer { scores: HashMap::new() }));
        let input: Vec<Candidate> = ["c", "a", "d", "b"]
            .iter()
            .enumerate()
            .map(|(rank, id)| candidate(id, rank))
            .collect();
        let out = reranker.rerank("q", input).await.unwrap();
        let ids: Vec<&str> = out.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "d", "b"]);
    }

    #[tokio::test]
    async fn score_count_mismatch_is_an_error() {
        let reranker = Reranker::new(Arc::new(ShortScorer));
        let err = reranker.rerank("q", vec![candidate("a", 0), candidate("b", 1)]).await;
        assert!(matches!(err, Err(RagError::RerankerError { .. })));
    }
}
