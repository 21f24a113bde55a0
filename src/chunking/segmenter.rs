//! Sentence segmentation for the semantic splitter.

use unicode_segmentation::UnicodeSegmentation;

/// Fragments shorter than this many characters are merged with a neighbor
/// rather than standing alone.
pub const DEFAULT_MIN_SENTENCE_CHARS: usize = 12;

/// Unicode sentence splitter with short-fragment merging.
///
/// UAX #29 boundaries produce a lot of stubs on technical prose
/// (abbreviations, list markers, bare headings). Anything under the
/// configured character floor is glued to its neighbor so downstream
/// embedding calls see sentence-sized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceSplitter {
    min_chars: usize,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_SENTENCE_CHARS,
        }
    }
}

impl SentenceSplitter {
    /// Splitter with a custom character floor; `min_chars <= 1` disables
    /// merging.
    #[must_use]
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// Split `text` into trimmed, non-empty sentences.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences: Vec<String> = Vec::new();
        for raw in text.unicode_sentences() {
            let fragment = raw.trim();
            if fragment.is_empty() {
                continue;
            }
            let short = fragment.chars().count() < self.min_chars;
            match sentences.last_mut() {
                Some(prev) if short || prev.chars().count() < self.min_chars => {
                    prev.push(' ');
                    prev.push_str(fragment);
                }
                _ => sentences.push(fragment.to_string()),
            }
        }
        sentences
    }
}
