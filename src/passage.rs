//! The passage value type shared by chunking, storage, and retrieval.
//!
//! A [`Passage`] is one retrieval-sized unit of document text plus its
//! metadata. The serialized shape doubles as the corpus interchange format:
//! one `{"text": ..., "metadata": {...}}` object per line in a JSON Lines
//! file, which must survive a round trip unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key recording how many sub-passages were folded into a passage.
/// Present only when more than one was.
pub const MERGED_CHUNKS_KEY: &str = "merged_chunks";

/// Prefix of the metadata keys carrying the heading path
/// (`Header_1`..`Header_4`).
pub const HEADER_KEY_PREFIX: &str = "Header_";

/// One unit of document text with its heading metadata.
///
/// `metadata` keys follow the corpus convention: `Header_<level>` entries
/// carry the governing heading path, [`MERGED_CHUNKS_KEY`] the fold count.
/// The map may be empty, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl Passage {
    /// Passage with empty metadata.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    /// Replace the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Fold count recorded at assembly, if more than one sub-passage was
    /// merged.
    #[must_use]
    pub fn merged_count(&self) -> Option<u64> {
        self.metadata.get(MERGED_CHUNKS_KEY)?.as_u64()
    }

    /// Heading breadcrumb (`"Guide > Install"`) from the `Header_N`
    /// metadata entries, in key order. Empty when the passage has no
    /// heading metadata.
    #[must_use]
    pub fn heading(&self) -> String {
        let titles: Vec<&str> = self
            .metadata
            .iter()
            .filter(|(key, _)| key.starts_with(HEADER_KEY_PREFIX))
            .filter_map(|(_, value)| value.as_str())
            .collect();
        titles.join(" > ")
    }

    /// Budget-token count of the passage text.
    #[must_use]
    pub fn token_count(&self) -> usize {
        crate::chunking::tokenizer::count(&self.text)
    }
}
