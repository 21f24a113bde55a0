//! Cross-cutting error types.
//!
//! Each pipeline stage owns a focused error enum defined next to the code
//! that raises it ([`EmbeddingError`](crate::embeddings::EmbeddingError),
//! [`StoreError`](crate::stores::StoreError),
//! [`RerankError`](crate::retrieval::RerankError),
//! [`GenerationError`](crate::generation::GenerationError),
//! [`JsonlError`](crate::ingestion::JsonlError)). This module carries the
//! two types that cut across stages: construction-time [`ConfigError`] and
//! the umbrella [`PipelineError`] returned by composed surfaces such as
//! [`ChunkingPipeline`](crate::chunking::ChunkingPipeline) and
//! [`QaPipeline`](crate::qa::QaPipeline).

use crate::embeddings::EmbeddingError;
use crate::generation::GenerationError;
use crate::ingestion::JsonlError;
use crate::retrieval::RerankError;
use crate::stores::StoreError;

/// Rejected configuration, reported at construction time.
///
/// Components validate their settings before doing any work; a component
/// that constructed successfully never fails for configuration reasons
/// afterwards.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The flush threshold must cover the trailing-buffer floor, otherwise
    /// the merge loop could emit passages smaller than the floor it
    /// promises.
    #[error("target_size ({target_size}) must be >= min_size ({min_size})")]
    TargetBelowMin {
        target_size: usize,
        min_size: usize,
    },

    /// A count-valued setting that the component cannot operate with at
    /// zero (batch sizes, candidate counts).
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    /// A backoff multiplier below 1.0 would shrink retry delays instead of
    /// growing them.
    #[error("retry_backoff must be >= 1.0 (got {value})")]
    BackoffBelowOne { value: f64 },

    /// Embedding width must be fixed and non-zero before a vector table can
    /// be created.
    #[error("embedding dimensions must be at least 1")]
    ZeroDimensions,

    /// Every passage fell under the token floor, leaving nothing to sample
    /// questions from.
    #[error("no passage reaches the {floor}-token floor")]
    NoEligiblePassages { floor: usize },
}

/// Umbrella error for the composed pipeline surfaces.
///
/// Stage errors convert in via `#[from]`, so `?` works across stage
/// boundaries while the variant preserves which stage failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid settings rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The embedding collaborator failed.
    #[error("embedding stage failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The vector store failed.
    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),

    /// The rerank stage failed; the result order could not be produced.
    #[error("rerank stage failed: {0}")]
    Rerank(#[from] RerankError),

    /// The generation collaborator failed.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// JSON Lines persistence failed.
    #[error("jsonl persistence failed: {0}")]
    Jsonl(#[from] JsonlError),
}
