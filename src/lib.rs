//! ```text
//! Markdown ──► chunking::HeaderSplitter ──► sections + breadcrumb metadata
//!                         │
//!                         ├─► chunking::EmbeddingSplitter (percentile breaks)
//!                         └─► chunking::ChunkAssembler ──► Vec<Passage>
//!
//! Vec<Passage> ──► ingestion::jsonl (corpus cache)
//!              └─► ingestion::CorpusEncoder ──► stores::{SqliteStore, MemoryStore}
//!
//! Query ──► retrieval::Retriever ──► vector search ──► RetrievalRanker (rerank)
//!                                                              │
//! qa::QaPipeline ◄── ranked passages ◄────────────────────────┘
//!       │
//!       ├─► generation::Generator ──► grounded answer
//!       └─► dataset::DatasetBuilder ──► evaluation::Evaluator
//! ```
//!
pub mod chunking;
pub mod dataset;
pub mod embeddings;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod passage;
pub mod qa;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chunking::{AssemblerConfig, ChunkAssembler, ChunkingPipeline};
pub use dataset::{DatasetBuilder, DatasetConfig, QaExample, QuestionStyle};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider, OpenAiEmbeddingProvider};
pub use evaluation::{EvalReport, EvalSummary, Evaluator};
pub use generation::{Generator, PacedBatchRunner, PacingConfig};
pub use ingestion::{CorpusEncoder, EncoderConfig};
pub use passage::Passage;
pub use qa::{PromptTemplate, QaOutcome, QaPipeline};
pub use retrieval::{RetrievalRanker, Retriever, RetrieverConfig};
pub use stores::{MemoryStore, SqliteStore, VectorStore};
pub use types::{ConfigError, PipelineError};
