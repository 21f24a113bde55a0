//! Hierarchical chunking: headers → semantic sub-splitting → assembly.
//!
//! ```text
//!   Markdown document
//!         │
//!         ▼
//!   HeaderSplitter ──────────── sections + heading paths
//!         │
//!         ▼
//!   SemanticSplitter (optional) sentence-embedding breakpoints,
//!         │                     or paragraph boundaries
//!         ▼
//!   ChunkAssembler ──────────── budget-sized passages with overlap
//! ```
//!
//! [`ChunkingPipeline`] wires the stages together; each stage is usable on
//! its own.

pub mod assembler;
pub mod headers;
pub mod pipeline;
pub mod segmenter;
pub mod semantic;
pub mod tokenizer;

pub use assembler::{AssemblerConfig, ChunkAssembler, SubPassage};
pub use headers::{HeaderSplitter, Section};
pub use pipeline::ChunkingPipeline;
pub use segmenter::SentenceSplitter;
pub use semantic::{BreakpointStrategy, EmbeddingSplitter, LexicalSplitter, SemanticSplitter};
