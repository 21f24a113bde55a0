//! Grounded question answering over retrieved passages.
//!
//! [`QaPipeline`] glues the two halves together: a [`Retriever`] picks the
//! passages, a [`PromptTemplate`] folds them under the question, and a
//! [`Generator`] writes the answer. The retrieved sources ride along in the
//! outcome so callers can cite or score them.

use std::sync::Arc;

use tracing::debug;

use crate::generation::Generator;
use crate::retrieval::{RankedCandidate, Retriever};
use crate::types::PipelineError;

/// Separator between passages inside the rendered context block.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const DEFAULT_PROMPT: &str = "\
Answer the question using only the context below. If the context does not \
contain the answer, say you do not know instead of guessing.

Context:
{context}

Question: {question}

Answer:";

/// Prompt text with `{context}` and `{question}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT.to_owned(),
        }
    }
}

impl PromptTemplate {
    /// Slot replaced by the joined passage texts.
    pub const CONTEXT_SLOT: &'static str = "{context}";
    /// Slot replaced by the user question.
    pub const QUESTION_SLOT: &'static str = "{question}";

    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Fill both slots. A template without a slot simply renders without
    /// that piece; no placeholder syntax beyond plain replacement.
    #[must_use]
    pub fn render(&self, context: &str, question: &str) -> String {
        self.template
            .replace(Self::CONTEXT_SLOT, context)
            .replace(Self::QUESTION_SLOT, question)
    }
}

/// Join retrieved passages into one context block, best match first.
#[must_use]
pub fn format_context(sources: &[RankedCandidate]) -> String {
    sources
        .iter()
        .map(|candidate| candidate.passage.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// An answered question together with the passages it was grounded on.
#[derive(Debug, Clone)]
pub struct QaOutcome {
    pub answer: String,
    /// Retrieval output in rank order; first entry backed the most context.
    pub sources: Vec<RankedCandidate>,
}

/// Retrieval-augmented answering pipeline.
pub struct QaPipeline {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    prompt: PromptTemplate,
}

impl QaPipeline {
    #[must_use]
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            prompt: PromptTemplate::default(),
        }
    }

    /// Swap the default prompt for a custom one.
    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Answer `question` from the corpus.
    ///
    /// An empty retrieval set is not an error: the generator sees an empty
    /// context block and the default prompt tells it to admit ignorance.
    pub async fn answer(&self, question: &str) -> Result<QaOutcome, PipelineError> {
        let sources = self.retriever.retrieve(question).await?;
        let context = format_context(&sources);
        let prompt = self.prompt.render(&context, question);
        debug!(
            question,
            sources = sources.len(),
            prompt_chars = prompt.len(),
            generator = self.generator.name(),
            "answering"
        );
        let answer = self.generator.generate(&prompt).await?;
        Ok(QaOutcome { answer, sources })
    }
}
