//! Semantic sub-splitting of sections.
//!
//! Before size-based assembly, each section is divided into coherent
//! sub-passages. The embedding-driven splitter compares consecutive
//! sentence embeddings by cosine distance and opens a break wherever the
//! distance clears a percentile of all observed distances; the lexical
//! splitter falls back to paragraph boundaries and needs no collaborators.

use std::sync::Arc;

use async_trait::async_trait;

use super::segmenter::SentenceSplitter;
use crate::embeddings::{EmbeddingError, EmbeddingProvider, cosine_similarity};

/// How breakpoints between consecutive sentences are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakpointStrategy {
    /// Break where cosine distance exceeds the given percentile
    /// (`0.0..=1.0`) of all consecutive-sentence distances.
    Percentile { threshold: f64 },
}

impl Default for BreakpointStrategy {
    fn default() -> Self {
        Self::Percentile { threshold: 0.95 }
    }
}

/// Divides section text into ordered sub-passages.
///
/// Implementations may call embedding models; failures surface as
/// [`EmbeddingError`] and are never retried here.
#[async_trait]
pub trait SemanticSplitter: Send + Sync {
    /// Split `text` into sub-passages. Blank input yields an empty vec.
    async fn split(&self, text: &str) -> Result<Vec<String>, EmbeddingError>;
}

// ── LexicalSplitter ────────────────────────────────────────────────────

/// Paragraph splitter: blank-line boundaries, no collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalSplitter;

#[async_trait]
impl SemanticSplitter for LexicalSplitter {
    async fn split(&self, text: &str) -> Result<Vec<String>, EmbeddingError> {
        Ok(split_paragraphs(text))
    }
}

/// Trimmed, non-empty paragraphs of `text`.
pub(crate) fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

// ── EmbeddingSplitter ──────────────────────────────────────────────────

/// Embedding-driven splitter with percentile breakpoints.
pub struct EmbeddingSplitter {
    provider: Arc<dyn EmbeddingProvider>,
    segmenter: SentenceSplitter,
    strategy: BreakpointStrategy,
    fallback_to_lexical: bool,
}

impl EmbeddingSplitter {
    /// Splitter over `provider` with default segmentation and strategy.
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            segmenter: SentenceSplitter::default(),
            strategy: BreakpointStrategy::default(),
            fallback_to_lexical: false,
        }
    }

    /// Replace the breakpoint strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: BreakpointStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the sentence segmenter.
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: SentenceSplitter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Degrade to paragraph splitting when the embedding call fails,
    /// instead of propagating the failure. Off unless asked for: the
    /// degraded output is visibly coarser and callers must opt into it.
    #[must_use]
    pub fn with_lexical_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_lexical = enabled;
        self
    }
}

#[async_trait]
impl SemanticSplitter for EmbeddingSplitter {
    async fn split(&self, text: &str) -> Result<Vec<String>, EmbeddingError> {
        let sentences = self.segmenter.split(text);
        if sentences.len() <= 1 {
            return Ok(sentences);
        }

        let embeddings = match self.provider.embed_batch(&sentences).await {
            Ok(embeddings) => embeddings,
            Err(err) if self.fallback_to_lexical => {
                tracing::warn!(
                    stage = "semantic_split",
                    error = %err,
                    "embedding failed; falling back to lexical paragraphs"
                );
                return Ok(split_paragraphs(text));
            }
            Err(err) => return Err(err),
        };
        if embeddings.len() != sentences.len() {
            return Err(EmbeddingError::CountMismatch {
                requested: sentences.len(),
                received: embeddings.len(),
            });
        }

        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - f64::from(cosine_similarity(&pair[0], &pair[1])))
            .collect();
        let BreakpointStrategy::Percentile { threshold } = self.strategy;
        let cut = percentile(&distances, threshold);

        let mut parts = Vec::new();
        let mut group: Vec<String> = Vec::new();
        for (index, sentence) in sentences.into_iter().enumerate() {
            group.push(sentence);
            let breaks_after = index < distances.len() && distances[index] > cut;
            if breaks_after {
                parts.push(group.join(" "));
                group = Vec::new();
            }
        }
        if !group.is_empty() {
            parts.push(group.join(" "));
        }

        tracing::debug!(
            sentences = distances.len() + 1,
            parts = parts.len(),
            "semantic split"
        );
        Ok(parts)
    }
}

/// Linear-interpolation percentile of an unsorted, non-empty sample.
fn percentile(sample: &[f64], q: f64) -> f64 {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let _ = texts;
            Err(EmbeddingError::Api {
                status: 500,
                body: "internal server error".into(),
            })
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Axis-aligned vectors per "topic" keyword, so distances are exactly
    /// 0.0 within a topic and 1.0 across topics.
    struct TopicProvider;

    #[async_trait]
    impl EmbeddingProvider for TopicProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|text| {
                    if text.contains("network") {
                        vec![0.0, 1.0, 0.0]
                    } else {
                        vec![1.0, 0.0, 0.0]
                    }
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "topic"
        }
    }

    #[tokio::test]
    async fn breaks_where_the_topic_changes() {
        let splitter = EmbeddingSplitter::new(Arc::new(TopicProvider))
            .with_segmenter(SentenceSplitter::new(1))
            .with_strategy(BreakpointStrategy::Percentile { threshold: 0.5 });
        let parts = splitter
            .split("Cooking stocks takes hours. Simmer the bones gently. The network stack drops idle connections.")
            .await
            .unwrap();
        assert_eq!(
            parts,
            vec![
                "Cooking stocks takes hours. Simmer the bones gently.".to_string(),
                "The network stack drops idle connections.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn single_sentence_needs_no_embeddings() {
        let splitter = EmbeddingSplitter::new(Arc::new(FailingProvider));
        let parts = splitter.split("Just one sentence here.").await.unwrap();
        assert_eq!(parts, vec!["Just one sentence here.".to_string()]);
    }

    #[tokio::test]
    async fn embedding_failure_propagates_without_fallback() {
        let splitter =
            EmbeddingSplitter::new(Arc::new(FailingProvider)).with_segmenter(SentenceSplitter::new(1));
        let err = splitter
            .split("One sentence. Another sentence.")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn opt_in_fallback_degrades_to_paragraphs() {
        let splitter = EmbeddingSplitter::new(Arc::new(FailingProvider))
            .with_segmenter(SentenceSplitter::new(1))
            .with_lexical_fallback(true);
        let parts = splitter
            .split("First paragraph one. More of it.\n\nSecond paragraph here.")
            .await
            .unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[1].starts_with("Second paragraph"));
    }

    #[tokio::test]
    async fn uniform_text_stays_one_part() {
        let splitter = EmbeddingSplitter::new(Arc::new(MockEmbeddingProvider::default()))
            .with_segmenter(SentenceSplitter::new(1))
            .with_strategy(BreakpointStrategy::Percentile { threshold: 1.0 });
        let parts = splitter
            .split("Alpha beta gamma. Delta epsilon zeta. Eta theta iota.")
            .await
            .unwrap();
        assert_eq!(parts.len(), 1);
    }
}
