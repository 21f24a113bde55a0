//! Corpus persistence and encoding.
//!
//! Two halves: [`jsonl`] reads and writes line-delimited JSON so chunked
//! corpora and generated datasets survive between runs, and
//! [`CorpusEncoder`] turns a passage list into embedded records inside a
//! [`VectorStore`](crate::stores::VectorStore).

pub mod encoder;
pub mod jsonl;

pub use encoder::{CorpusEncoder, EncodeReport, EncoderConfig};
pub use jsonl::{JsonlError, read_jsonl, write_jsonl};
