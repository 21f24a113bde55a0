//! Two-stage retrieval: vector search, then cross-encoder reranking.
//!
//! ```text
//!   query ──► EmbeddingProvider ──► VectorStore.search(search_k)
//!                                         │ candidates
//!                                         ▼
//!                               RetrievalRanker (optional)
//!                         one batched RerankScorer call,
//!                         stable sort by score, keep rerank_k
//!                                         │
//!                                         ▼
//!                                 ranked candidates
//! ```
//!
//! The ranker is injected state: callers construct it with the scorer they
//! want and hand it to the [`Retriever`]. When the rerank stage is absent,
//! store order (similarity) stands.

pub mod ranker;
pub mod retriever;
pub mod scorer;

pub use ranker::{RankedCandidate, RetrievalRanker};
pub use retriever::{Retriever, RetrieverConfig};
pub use scorer::{HttpRerankScorer, HttpRerankScorerConfig, RerankScorer};

/// Failure raised by the rerank stage. The stage never falls back to
/// similarity order on failure; the error carries the cause instead.
#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    /// Transport-level failure reaching the scoring endpoint.
    #[error("rerank request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("rerank endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Scores did not line up one-to-one with the scored texts.
    #[error("rerank score count mismatch: sent {sent}, received {received}")]
    CountMismatch { sent: usize, received: usize },

    /// The endpoint URL could not be built.
    #[error("invalid rerank endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
