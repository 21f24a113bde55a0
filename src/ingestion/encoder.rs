//! Batched embedding of a chunked corpus into a vector store.

use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::SharedEmbeddingProvider;
use crate::passage::Passage;
use crate::stores::{PassageRecord, SharedVectorStore};
use crate::types::{ConfigError, PipelineError};

/// Settings for [`CorpusEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Passages embedded per provider call.
    pub embed_batch_size: usize,
    /// Leave an already-populated store untouched instead of re-encoding.
    pub skip_if_populated: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: 64,
            skip_if_populated: true,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embed_batch_size == 0 {
            return Err(ConfigError::ZeroCount {
                name: "embed_batch_size",
            });
        }
        Ok(())
    }
}

/// What an encode pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeReport {
    /// Passages embedded and stored in this pass.
    pub encoded: usize,
    /// Provider calls made.
    pub batches: usize,
    /// True when an already-populated store short-circuited the pass.
    pub skipped: bool,
}

/// Embeds passages in batches and writes them to a [`VectorStore`]
/// under fresh UUID ids.
///
/// [`VectorStore`]: crate::stores::VectorStore
pub struct CorpusEncoder {
    embedder: SharedEmbeddingProvider,
    store: SharedVectorStore,
    config: EncoderConfig,
}

impl std::fmt::Debug for CorpusEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusEncoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CorpusEncoder {
    pub fn new(
        embedder: SharedEmbeddingProvider,
        store: SharedVectorStore,
        config: EncoderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    /// Encode `passages` into the store.
    ///
    /// Each batch is embedded and written before the next is touched, so an
    /// abort mid-corpus leaves completed batches queryable.
    pub async fn encode(&self, passages: Vec<Passage>) -> Result<EncodeReport, PipelineError> {
        if self.config.skip_if_populated {
            let existing = self.store.count().await?;
            if existing > 0 {
                info!(existing, "store already populated; skipping encode");
                return Ok(EncodeReport {
                    skipped: true,
                    ..EncodeReport::default()
                });
            }
        }

        let mut report = EncodeReport::default();
        for chunk in passages.chunks(self.config.embed_batch_size) {
            let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            let records: Vec<PassageRecord> = chunk
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(passage, embedding)| {
                    PassageRecord::new(Uuid::new_v4().to_string(), passage, embedding)
                })
                .collect();
            let stored = records.len();
            self.store.add(records).await?;
            report.encoded += stored;
            report.batches += 1;
            debug!(batch = report.batches, stored, "encoded batch");
        }

        info!(
            encoded = report.encoded,
            batches = report.batches,
            provider = self.embedder.name(),
            "corpus encoded"
        );
        Ok(report)
    }
}
