//! Size-budgeted passage assembly.
//!
//! # Merge loop
//!
//! 1. Sub-passages fold into a buffer in order, joined by a blank line.
//!    The buffer keeps the metadata of the first sub-passage it absorbed
//!    and counts how many it holds.
//! 2. A buffer at or above `target_size` budget tokens is emitted as a
//!    [`Passage`]; `merged_chunks` is recorded in the metadata when more
//!    than one sub-passage was folded.
//! 3. With `overlap > 0`, the next buffer starts pre-seeded with the last
//!    `overlap` tokens of the emitted text and the metadata of the
//!    sub-passage that triggered the emit. The seed counts as one unit,
//!    not as a completed merge.
//! 4. A trailing buffer below `min_size` is discarded.
//!
//! The loop is input-driven: each sub-passage is examined exactly once, a
//! sub-passage is never split, and output order follows input order.

use serde_json::{Map, Value};

use super::tokenizer;
use crate::passage::{MERGED_CHUNKS_KEY, Passage};
use crate::types::ConfigError;

// ── Configuration ──────────────────────────────────────────────────────

/// Budgets for [`ChunkAssembler`]; all counts are whitespace tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Flush threshold: a buffer at or above this emits a passage.
    pub target_size: usize,
    /// Floor for the trailing buffer; smaller tails are dropped.
    pub min_size: usize,
    /// Tokens carried from an emitted passage into the next buffer.
    pub overlap: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            target_size: 400,
            min_size: 120,
            overlap: 50,
        }
    }
}

impl AssemblerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_size < self.min_size {
            return Err(ConfigError::TargetBelowMin {
                target_size: self.target_size,
                min_size: self.min_size,
            });
        }
        Ok(())
    }
}

// ── Input ──────────────────────────────────────────────────────────────

/// One unit of assembler input: text plus the metadata that carries into
/// whichever passage first absorbs it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubPassage {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl SubPassage {
    #[must_use]
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

// ── ChunkAssembler ─────────────────────────────────────────────────────

/// Folds sub-passages into retrieval-sized passages.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    config: AssemblerConfig,
}

impl ChunkAssembler {
    /// Assembler with validated budgets.
    pub fn new(config: AssemblerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Run the merge loop over `sub_passages`.
    pub fn assemble(&self, sub_passages: impl IntoIterator<Item = SubPassage>) -> Vec<Passage> {
        let mut passages = Vec::new();
        let mut buffer = String::new();
        let mut metadata: Map<String, Value> = Map::new();
        let mut folded = 0usize;

        for SubPassage {
            text,
            metadata: part_metadata,
        } in sub_passages
        {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            if buffer.is_empty() {
                buffer = trimmed.to_string();
                metadata = part_metadata.clone();
                folded = 1;
            } else {
                buffer.push_str("\n\n");
                buffer.push_str(trimmed);
                folded += 1;
            }

            if tokenizer::count(&buffer) >= self.config.target_size {
                let emitted_text = std::mem::take(&mut buffer);
                let emitted_metadata = std::mem::take(&mut metadata);
                if self.config.overlap > 0 {
                    buffer = tokenizer::tail(&emitted_text, self.config.overlap).join(" ");
                    metadata = part_metadata;
                }
                passages.push(emit(emitted_text, emitted_metadata, folded));
                folded = if buffer.is_empty() { 0 } else { 1 };
            }
        }

        if !buffer.is_empty() {
            let tail_tokens = tokenizer::count(&buffer);
            if tail_tokens >= self.config.min_size {
                passages.push(emit(buffer, metadata, folded));
            } else {
                tracing::debug!(
                    tokens = tail_tokens,
                    min_size = self.config.min_size,
                    "discarding trailing buffer under the minimum"
                );
            }
        }

        passages
    }
}

fn emit(text: String, mut metadata: Map<String, Value>, folded: usize) -> Passage {
    if folded > 1 {
        metadata.insert(MERGED_CHUNKS_KEY.to_string(), Value::from(folded as u64));
    }
    Passage { text, metadata }
}
