//! Cross-encoder reranking over a candidate pool.

use std::sync::Arc;

use super::RerankError;
use super::scorer::RerankScorer;
use crate::passage::Passage;
use crate::stores::Candidate;
use crate::types::ConfigError;

/// A candidate that survived reranking, with both retrieval scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub passage: Passage,
    /// Cosine similarity from the vector-search stage.
    pub similarity: f32,
    /// Cross-encoder relevance from the rerank stage.
    pub rerank_score: f32,
}

/// Re-scores a candidate pool and keeps the best `rerank_k`.
///
/// Built around an injected [`RerankScorer`]; there is no process-global
/// scorer state. Ordering is a stable sort on the rerank score descending,
/// so candidates with equal scores keep their vector-search order.
pub struct RetrievalRanker {
    scorer: Arc<dyn RerankScorer>,
    rerank_k: usize,
}

impl std::fmt::Debug for RetrievalRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalRanker")
            .field("scorer", &self.scorer.name())
            .field("rerank_k", &self.rerank_k)
            .finish()
    }
}

impl RetrievalRanker {
    /// Final candidate count used when callers have no tuned value.
    pub const DEFAULT_RERANK_K: usize = 8;

    /// Ranker keeping the top `rerank_k` candidates
    /// ([`DEFAULT_RERANK_K`](Self::DEFAULT_RERANK_K) when unsure).
    pub fn new(scorer: Arc<dyn RerankScorer>, rerank_k: usize) -> Result<Self, ConfigError> {
        if rerank_k == 0 {
            return Err(ConfigError::ZeroCount { name: "rerank_k" });
        }
        Ok(Self { scorer, rerank_k })
    }

    #[must_use]
    pub fn rerank_k(&self) -> usize {
        self.rerank_k
    }

    /// Score `candidates` against `query` in one batched call, sort by
    /// score descending (stable), and keep the top `rerank_k`.
    ///
    /// An empty pool short-circuits to an empty result without touching
    /// the scorer. A scorer failure is returned as-is; the similarity
    /// ordering is never substituted for missing scores.
    pub async fn rank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<RankedCandidate>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.passage.text.clone())
            .collect();
        let scores = self.scorer.score(query, &texts).await?;
        if scores.len() != candidates.len() {
            return Err(RerankError::CountMismatch {
                sent: candidates.len(),
                received: scores.len(),
            });
        }

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, rerank_score)| RankedCandidate {
                passage: candidate.passage,
                similarity: candidate.similarity,
                rerank_score,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.rerank_k);

        tracing::debug!(
            scored = texts.len(),
            kept = ranked.len(),
            scorer = self.scorer.name(),
            "reranked candidates"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Scores by position in a fixed answer list.
    struct FixedScorer {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl RerankScorer for FixedScorer {
        async fn score(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>, RerankError> {
            assert_eq!(texts.len(), self.scores.len());
            Ok(self.scores.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Fails the whole batch.
    struct BrokenScorer;

    #[async_trait]
    impl RerankScorer for BrokenScorer {
        async fn score(&self, _query: &str, _texts: &[String]) -> Result<Vec<f32>, RerankError> {
            Err(RerankError::Api {
                status: 500,
                body: "scoring backend down".into(),
            })
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    /// Panics if the ranker ever consults it.
    struct UntouchableScorer;

    #[async_trait]
    impl RerankScorer for UntouchableScorer {
        async fn score(&self, _query: &str, _texts: &[String]) -> Result<Vec<f32>, RerankError> {
            panic!("scorer must not be called for an empty pool");
        }

        fn name(&self) -> &str {
            "untouchable"
        }
    }

    fn pool(texts: &[&str]) -> Vec<Candidate> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| Candidate {
                passage: Passage::new(*text),
                // store order encodes descending similarity
                similarity: 1.0 - index as f32 * 0.1,
            })
            .collect()
    }

    #[tokio::test]
    async fn sorts_by_rerank_score_and_keeps_top_k() {
        let scorer = Arc::new(FixedScorer {
            scores: vec![0.1, 0.9, 0.5],
        });
        let ranker = RetrievalRanker::new(scorer, 2).unwrap();
        let ranked = ranker.rank("q", pool(&["a", "b", "c"])).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].passage.text, "b");
        assert_eq!(ranked[1].passage.text, "c");
        assert!(ranked[0].rerank_score > ranked[1].rerank_score);
    }

    #[tokio::test]
    async fn equal_scores_keep_vector_search_order() {
        let scorer = Arc::new(FixedScorer {
            scores: vec![0.5, 0.5, 0.5],
        });
        let ranker = RetrievalRanker::new(scorer, 3).unwrap();
        let ranked = ranker.rank("q", pool(&["a", "b", "c"])).await.unwrap();

        let texts: Vec<&str> = ranked.iter().map(|r| r.passage.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn pool_smaller_than_k_returns_the_whole_pool() {
        let scorer = Arc::new(FixedScorer {
            scores: vec![0.3, 0.7],
        });
        let ranker = RetrievalRanker::new(scorer, 8).unwrap();
        let ranked = ranker.rank("q", pool(&["a", "b"])).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn empty_pool_never_touches_the_scorer() {
        let ranker = RetrievalRanker::new(Arc::new(UntouchableScorer), 8).unwrap();
        let ranked = ranker.rank("q", Vec::new()).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn scorer_failure_is_not_papered_over() {
        let ranker = RetrievalRanker::new(Arc::new(BrokenScorer), 8).unwrap();
        let err = ranker.rank("q", pool(&["a"])).await.unwrap_err();
        assert!(matches!(err, RerankError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn zero_rerank_k_is_rejected_at_construction() {
        let err = RetrievalRanker::new(Arc::new(UntouchableScorer), 0).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCount { name: "rerank_k" }));
    }

    #[tokio::test]
    async fn similarity_scores_survive_reranking() {
        let scorer = Arc::new(FixedScorer {
            scores: vec![0.2, 0.8],
        });
        let ranker = RetrievalRanker::new(scorer, 2).unwrap();
        let ranked = ranker.rank("q", pool(&["a", "b"])).await.unwrap();

        // "b" was second in store order, similarity 0.9
        assert_eq!(ranked[0].passage.text, "b");
        assert!((ranked[0].similarity - 0.9).abs() < 1e-6);
    }
}
