//! The unified retrieval chain.

use super::ranker::{RankedCandidate, RetrievalRanker};
use crate::embeddings::SharedEmbeddingProvider;
use crate::stores::SharedVectorStore;
use crate::types::{ConfigError, PipelineError};

/// Candidate counts for the two retrieval stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Candidates fetched from the vector store.
    pub search_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { search_k: 20 }
    }
}

impl RetrieverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_k == 0 {
            return Err(ConfigError::ZeroCount { name: "search_k" });
        }
        Ok(())
    }
}

/// Embeds a query, searches the store, and optionally reranks.
///
/// The rerank stage is a capability: present when a [`RetrievalRanker`]
/// was installed, absent otherwise. Without it, candidates keep store
/// order and their rerank score mirrors the similarity.
pub struct Retriever {
    embedder: SharedEmbeddingProvider,
    store: SharedVectorStore,
    ranker: Option<RetrievalRanker>,
    config: RetrieverConfig,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.name())
            .field("reranked", &self.ranker.is_some())
            .field("search_k", &self.config.search_k)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Similarity-only retriever.
    pub fn new(
        embedder: SharedEmbeddingProvider,
        store: SharedVectorStore,
        config: RetrieverConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            embedder,
            store,
            ranker: None,
            config,
        })
    }

    /// Install the rerank stage.
    #[must_use]
    pub fn with_ranker(mut self, ranker: RetrievalRanker) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Retrieve the passages most relevant to `query`.
    ///
    /// With a ranker installed: `search_k` candidates from the store, one
    /// batched rerank, top `rerank_k` survive. Without one: `search_k`
    /// candidates in store order.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RankedCandidate>, PipelineError> {
        let query_text = [query.to_string()];
        let query_vec = self.embedder.embed_batch(&query_text).await?;
        let query_vec = query_vec.into_iter().next().unwrap_or_default();

        let candidates = self.store.search(&query_vec, self.config.search_k).await?;
        tracing::debug!(
            candidates = candidates.len(),
            search_k = self.config.search_k,
            "vector search complete"
        );

        match &self.ranker {
            Some(ranker) => Ok(ranker.rank(query, candidates).await?),
            None => Ok(candidates
                .into_iter()
                .map(|candidate| RankedCandidate {
                    rerank_score: candidate.similarity,
                    similarity: candidate.similarity,
                    passage: candidate.passage,
                })
                .collect()),
        }
    }
}
