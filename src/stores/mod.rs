//! Vector store seam.
//!
//! ```text
//!                 VectorStore (trait)
//!                 /               \
//!        MemoryStore           SqliteStore
//!   exact cosine scan     sqlite-vec `vec0` table
//!   tests, small corpora  persistent corpora
//! ```
//!
//! Stores hold [`PassageRecord`]s and answer similarity queries with
//! [`Candidate`]s ordered closest-first. `add` is idempotent per record id.
//! Index internals (ANN structure, persistence format) stay behind the
//! trait.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::passage::Passage;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Shared handle for store trait objects.
pub type SharedVectorStore = Arc<dyn VectorStore>;

/// Failure raised by a vector store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying storage engine failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Vector width differs from the store's fixed dimension.
    #[error("dimension mismatch: store holds {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One persisted passage plus its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    /// Caller-supplied id; `add` replaces an existing record with the same
    /// id.
    pub id: String,
    pub passage: Passage,
    pub embedding: Vec<f32>,
}

impl PassageRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, passage: Passage, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            passage,
            embedding,
        }
    }
}

/// Search hit: the stored passage and its cosine similarity to the query
/// (higher is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub passage: Passage,
    pub similarity: f32,
}

/// Approximate-or-exact nearest-neighbor storage for passages.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    async fn add(&self, records: Vec<PassageRecord>) -> Result<(), StoreError>;

    /// The `k` stored passages most similar to `embedding`, closest first.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}
