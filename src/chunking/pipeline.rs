//! Document-to-passages orchestration.
//!
//! # Execution model
//!
//! 1. [`HeaderSplitter`] divides the document into header-delimited
//!    sections.
//! 2. Each section's heading breadcrumb is prepended to its text as a
//!    `"Guide > Install"` line, so passages stay self-describing once
//!    separated from the document.
//! 3. The section is divided into sub-passages by the configured
//!    [`SemanticSplitter`], or by paragraph boundaries when no semantic
//!    stage is installed.
//! 4. [`ChunkAssembler`] folds the sub-passages into budget-sized
//!    passages; section metadata rides along.
//!
//! Stages run strictly in order; the only awaits are the semantic
//! splitter's embedding calls.

use std::sync::Arc;

use super::assembler::{AssemblerConfig, ChunkAssembler, SubPassage};
use super::headers::HeaderSplitter;
use super::semantic::{SemanticSplitter, split_paragraphs};
use crate::passage::Passage;
use crate::types::{ConfigError, PipelineError};

/// Markdown in, budget-sized [`Passage`]s out.
pub struct ChunkingPipeline {
    headers: HeaderSplitter,
    semantic: Option<Arc<dyn SemanticSplitter>>,
    assembler: ChunkAssembler,
}

impl ChunkingPipeline {
    /// Pipeline with the given budgets, no semantic stage, and default
    /// header splitting.
    pub fn new(config: AssemblerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            headers: HeaderSplitter::default(),
            semantic: None,
            assembler: ChunkAssembler::new(config)?,
        })
    }

    /// Replace the header splitter.
    #[must_use]
    pub fn with_header_splitter(mut self, headers: HeaderSplitter) -> Self {
        self.headers = headers;
        self
    }

    /// Install a semantic sub-splitting stage.
    #[must_use]
    pub fn with_semantic_splitter(mut self, splitter: Arc<dyn SemanticSplitter>) -> Self {
        self.semantic = Some(splitter);
        self
    }

    /// Chunk one Markdown document into passages.
    pub async fn chunk_document(&self, markdown: &str) -> Result<Vec<Passage>, PipelineError> {
        let sections = self.headers.split(markdown);
        let mut sub_passages = Vec::new();

        for section in &sections {
            let breadcrumb = section.breadcrumb();
            let text = if breadcrumb.is_empty() {
                section.text.clone()
            } else {
                format!("{breadcrumb}\n\n{}", section.text)
            };

            let parts = match &self.semantic {
                Some(splitter) => splitter.split(&text).await?,
                None => split_paragraphs(&text),
            };

            let metadata = section.metadata();
            sub_passages.extend(
                parts
                    .into_iter()
                    .map(|part| SubPassage::new(part, metadata.clone())),
            );
        }

        let passages = self.assembler.assemble(sub_passages);
        tracing::debug!(
            sections = sections.len(),
            passages = passages.len(),
            "chunked document"
        );
        Ok(passages)
    }
}
