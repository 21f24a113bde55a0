//! Embedding provider seam.
//!
//! Everything that turns text into vectors sits behind
//! [`EmbeddingProvider`]: the HTTP client for OpenAI-compatible endpoints,
//! the deterministic mock, and the memoizing cache wrapper. Providers never
//! retry internally; retry policy belongs to the paced batch runner.

pub mod cache;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

pub use cache::{CacheStats, EmbeddingCache};
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};

/// Shared handle for provider trait objects.
pub type SharedEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Failure raised by an embedding collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Transport-level failure reaching the endpoint.
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("embedding endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response decoded but did not line up with the request.
    #[error("embedding count mismatch: requested {requested}, received {received}")]
    CountMismatch { requested: usize, received: usize },

    /// The endpoint URL could not be built.
    #[error("invalid embedding endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Turns batches of text into index-aligned vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts` in one call; result `i` corresponds to input `i`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Output vector width.
    fn dimensions(&self) -> usize;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is
/// all-zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// ── MockEmbeddingProvider ──────────────────────────────────────────────

/// Deterministic provider for tests and demos.
///
/// Each text hashes into a unit vector, so equal texts always agree and
/// distinct texts land far apart often enough to exercise ranking paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| hash_to_unit_vector(text, self.dimensions))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn hash_to_unit_vector(text: &str, dimensions: usize) -> Vec<f32> {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut vector = Vec::with_capacity(dimensions);
    for axis in 0..dimensions {
        let mut hasher = DefaultHasher::new();
        (text, axis).hash(&mut hasher);
        // spread hashes over [-1.0, 1.0)
        vector.push((hasher.finish() % 2048) as f32 / 1024.0 - 1.0);
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
