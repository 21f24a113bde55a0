//! Synthetic evaluation dataset generation.
//!
//! [`DatasetBuilder`] samples passages from a chunked corpus, asks a
//! [`Generator`] to write one question/answer pair per sampled context set,
//! and collects the rows as [`QaExample`]s. Generation runs through
//! [`PacedBatchRunner`], so rate limits back off and a permanent failure
//! aborts with the rows produced so far. Finished datasets cache as JSONL;
//! a later run with the same path loads the cache instead of burning
//! generation budget again.
//!
//! Question styles follow a fixed mix: half the examples are single-hop
//! questions against one passage, the rest split between abstract and
//! specific multi-hop questions spanning two passages.

use std::path::Path;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::generation::{
    BatchJob, GenerationError, PacedBatchRunner, PacedRun, PacedRunError, PacingConfig,
    SharedGenerator,
};
use crate::ingestion::{read_jsonl, write_jsonl};
use crate::passage::Passage;
use crate::types::{ConfigError, PipelineError};

use async_trait::async_trait;

// ── Examples and styles ─────────────────────────────────────────────────────

/// The shape of reasoning a generated question should demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStyle {
    /// One concrete fact from one passage.
    SingleHopSpecific,
    /// A theme that only emerges across passages.
    MultiHopAbstract,
    /// A concrete fact that requires combining passages.
    MultiHopSpecific,
}

impl QuestionStyle {
    /// Sampling mix: half single-hop, the rest split across multi-hop.
    pub const WEIGHTED: [(QuestionStyle, f64); 3] = [
        (QuestionStyle::SingleHopSpecific, 0.5),
        (QuestionStyle::MultiHopAbstract, 0.25),
        (QuestionStyle::MultiHopSpecific, 0.25),
    ];

    /// Passages sampled for one example of this style.
    fn contexts_needed(self) -> usize {
        match self {
            QuestionStyle::SingleHopSpecific => 1,
            QuestionStyle::MultiHopAbstract | QuestionStyle::MultiHopSpecific => 2,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            QuestionStyle::SingleHopSpecific => {
                "Write one specific question answerable from a single detail \
                 in the context, together with its answer."
            }
            QuestionStyle::MultiHopAbstract => {
                "Write one abstract question whose answer synthesizes themes \
                 that span the context sections, together with its answer."
            }
            QuestionStyle::MultiHopSpecific => {
                "Write one specific question that can only be answered by \
                 combining details from different context sections, together \
                 with its answer."
            }
        }
    }
}

/// One generated evaluation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaExample {
    pub question: String,
    /// Reference answer, grounded in `contexts`.
    pub answer: String,
    /// The passage texts the pair was written from.
    pub contexts: Vec<String>,
    pub style: QuestionStyle,
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Settings for [`DatasetBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Passages under this whitespace-token count are never sampled;
    /// fragments make degenerate questions.
    pub min_passage_tokens: usize,
    /// Seed for passage and style sampling. Same seed, same corpus, same
    /// draws.
    pub seed: u64,
    /// Pacing for the generation run.
    pub pacing: PacingConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            min_passage_tokens: 50,
            seed: 42,
            pacing: PacingConfig::default(),
        }
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Generates [`QaExample`]s from a corpus through a paced [`Generator`].
///
/// [`Generator`]: crate::generation::Generator
pub struct DatasetBuilder {
    generator: SharedGenerator,
    passages: Vec<Passage>,
    runner: PacedBatchRunner,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for DatasetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetBuilder")
            .field("passages", &self.passages.len())
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl DatasetBuilder {
    /// Filter `passages` by the token floor and set up the paced runner.
    pub fn new(
        generator: SharedGenerator,
        passages: Vec<Passage>,
        config: DatasetConfig,
    ) -> Result<Self, ConfigError> {
        let floor = config.min_passage_tokens;
        let total = passages.len();
        let eligible: Vec<Passage> = passages
            .into_iter()
            .filter(|p| p.token_count() >= floor)
            .collect();
        if eligible.is_empty() {
            return Err(ConfigError::NoEligiblePassages { floor });
        }
        debug!(
            eligible = eligible.len(),
            dropped = total - eligible.len(),
            floor,
            "dataset corpus filtered"
        );
        let runner = PacedBatchRunner::new(config.pacing)?;
        Ok(Self {
            generator,
            passages: eligible,
            runner,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
        })
    }

    /// Generate `total` examples under the configured pacing.
    pub async fn generate(
        &self,
        total: usize,
    ) -> Result<PacedRun<QaExample>, PacedRunError<QaExample>> {
        self.runner.run(total, self).await
    }

    /// Generate `total` examples, or load them from `path` if a cache from
    /// an earlier run exists there.
    ///
    /// On abort, rows produced so far are saved next to `path` under a
    /// `partial.jsonl` extension so the spent budget is not lost.
    pub async fn generate_cached(
        &self,
        path: impl AsRef<Path>,
        total: usize,
    ) -> Result<Vec<QaExample>, PipelineError> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let rows: Vec<QaExample> = read_jsonl(path).await?;
            info!(
                rows = rows.len(),
                path = %path.display(),
                "loaded cached dataset"
            );
            return Ok(rows);
        }

        match self.generate(total).await {
            Ok(run) => {
                write_jsonl(path, &run.rows).await?;
                info!(
                    rows = run.rows.len(),
                    retries = run.retries,
                    path = %path.display(),
                    "dataset generated and cached"
                );
                Ok(run.rows)
            }
            Err(aborted) => {
                if !aborted.rows.is_empty() {
                    let partial = path.with_extension("partial.jsonl");
                    match write_jsonl(&partial, &aborted.rows).await {
                        Ok(()) => warn!(
                            rows = aborted.rows.len(),
                            path = %partial.display(),
                            "saved partial dataset before abort"
                        ),
                        Err(err) => warn!(error = %err, "failed to save partial dataset"),
                    }
                }
                Err(PipelineError::Generation(aborted.source))
            }
        }
    }

    fn sample_contexts<R: Rng>(&self, rng: &mut R, count: usize) -> Vec<String> {
        let take = count.min(self.passages.len());
        let mut indices: Vec<usize> = (0..self.passages.len()).collect();
        for i in 0..take {
            let j = rng.random_range(i..indices.len());
            indices.swap(i, j);
        }
        indices[..take]
            .iter()
            .map(|&i| self.passages[i].text.clone())
            .collect()
    }
}

#[async_trait]
impl BatchJob for DatasetBuilder {
    type Row = QaExample;

    async fn run_batch(&self, count: usize) -> Result<Vec<QaExample>, GenerationError> {
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            let (style, contexts) = {
                let mut rng = self.rng.lock();
                let style = sample_style(&mut *rng);
                let contexts = self.sample_contexts(&mut *rng, style.contexts_needed());
                (style, contexts)
            };
            let prompt = render_prompt(style, &contexts);
            let reply = self.generator.generate(&prompt).await?;
            let pair = parse_pair(&reply)?;
            rows.push(QaExample {
                question: pair.question,
                answer: pair.answer,
                contexts,
                style,
            });
        }
        Ok(rows)
    }
}

// ── Sampling and parsing ────────────────────────────────────────────────────

fn sample_style<R: Rng>(rng: &mut R) -> QuestionStyle {
    let roll: f64 = rng.random();
    let mut cumulative = 0.0;
    for (style, weight) in QuestionStyle::WEIGHTED {
        cumulative += weight;
        if roll < cumulative {
            return style;
        }
    }
    // Weights sum to 1.0; only float slack lands here.
    QuestionStyle::MultiHopSpecific
}

fn render_prompt(style: QuestionStyle, contexts: &[String]) -> String {
    let joined = contexts.join("\n\n---\n\n");
    format!(
        "You are writing evaluation data for a documentation assistant.\n\n\
         {}\n\n\
         Context:\n{joined}\n\n\
         Reply with exactly one JSON object of the shape \
         {{\"question\": \"...\", \"answer\": \"...\"}} and nothing else. \
         The answer must be fully supported by the context.",
        style.instruction()
    )
}

#[derive(Deserialize)]
struct GeneratedPair {
    question: String,
    answer: String,
}

/// Peel a Markdown code fence off a model reply, if present.
fn extract_json(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_pair(reply: &str) -> Result<GeneratedPair, GenerationError> {
    serde_json::from_str(extract_json(reply)).map_err(|err| {
        GenerationError::Malformed(format!("expected a question/answer object: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ErrorClass, Generator};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers every prompt with the same well-formed pair.
    struct ScriptedGenerator {
        calls: Mutex<usize>,
        reply: &'static str,
    }

    impl ScriptedGenerator {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
                reply,
            })
        }

        fn pair() -> Arc<Self> {
            Self::new(r#"{"question": "What is alpha?", "answer": "Alpha is first."}"#)
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            *self.calls.lock() += 1;
            Ok(self.reply.to_owned())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn quick_pacing() -> PacingConfig {
        PacingConfig {
            batch_size: 2,
            inter_batch_delay: Duration::ZERO,
            max_retries: 1,
            retry_base_delay: Duration::ZERO,
            retry_backoff: 1.0,
        }
    }

    fn long_passage(word: &str) -> Passage {
        // Comfortably above any floor used in these tests.
        Passage::new(format!("{word} ").repeat(12).trim().to_owned())
    }

    fn builder_with(
        generator: Arc<dyn Generator>,
        passages: Vec<Passage>,
        floor: usize,
        seed: u64,
    ) -> DatasetBuilder {
        DatasetBuilder::new(
            generator,
            passages,
            DatasetConfig {
                min_passage_tokens: floor,
                seed,
                pacing: quick_pacing(),
            },
        )
        .unwrap()
    }

    #[test]
    fn styles_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&QuestionStyle::SingleHopSpecific).unwrap(),
            "\"single_hop_specific\""
        );
        for (style, _) in QuestionStyle::WEIGHTED {
            let json = serde_json::to_string(&style).unwrap();
            let back: QuestionStyle = serde_json::from_str(&json).unwrap();
            assert_eq!(back, style);
        }
    }

    #[test]
    fn style_weights_sum_to_one() {
        let total: f64 = QuestionStyle::WEIGHTED.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn style_sampling_is_seeded_and_roughly_weighted() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let draws_a: Vec<QuestionStyle> = (0..32).map(|_| sample_style(&mut a)).collect();
        let draws_b: Vec<QuestionStyle> = (0..32).map(|_| sample_style(&mut b)).collect();
        assert_eq!(draws_a, draws_b);

        let mut rng = StdRng::seed_from_u64(11);
        let mut single = 0usize;
        for _ in 0..1000 {
            if sample_style(&mut rng) == QuestionStyle::SingleHopSpecific {
                single += 1;
            }
        }
        // Half the mass, with generous slack for one seed.
        assert!((400..=600).contains(&single), "single-hop draws: {single}");
    }

    #[test]
    fn examples_round_trip_through_jsonl() {
        let example = QaExample {
            question: "What is alpha?".to_owned(),
            answer: "Alpha is first.".to_owned(),
            contexts: vec!["alpha context".to_owned(), "beta context".to_owned()],
            style: QuestionStyle::MultiHopSpecific,
        };
        let line = serde_json::to_string(&example).unwrap();
        assert!(line.contains("\"style\":\"multi_hop_specific\""));
        let back: QaExample = serde_json::from_str(&line).unwrap();
        assert_eq!(back, example);
    }

    #[test]
    fn fenced_replies_are_unwrapped() {
        assert_eq!(extract_json("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn all_short_corpus_is_rejected() {
        let err = DatasetBuilder::new(
            ScriptedGenerator::pair(),
            vec![Passage::new("too short")],
            DatasetConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NoEligiblePassages { floor: 50 });
    }

    #[tokio::test]
    async fn contexts_come_only_from_eligible_passages() {
        let passages = vec![
            Passage::new("tiny"),
            long_passage("alpha"),
            long_passage("beta"),
        ];
        let builder = builder_with(ScriptedGenerator::pair(), passages, 5, 42);

        let run = builder.generate(6).await.unwrap();

        assert_eq!(run.rows.len(), 6);
        assert_eq!(run.batches, 3);
        for row in &run.rows {
            match row.style {
                QuestionStyle::SingleHopSpecific => assert_eq!(row.contexts.len(), 1),
                _ => {
                    assert_eq!(row.contexts.len(), 2);
                    assert_ne!(row.contexts[0], row.contexts[1]);
                }
            }
            for context in &row.contexts {
                assert!(!context.contains("tiny"), "short passage was sampled");
            }
        }
    }

    #[tokio::test]
    async fn same_seed_means_same_draws() {
        let passages = vec![
            long_passage("alpha"),
            long_passage("beta"),
            long_passage("gamma"),
        ];
        let a = builder_with(ScriptedGenerator::pair(), passages.clone(), 5, 99);
        let b = builder_with(ScriptedGenerator::pair(), passages, 5, 99);

        let rows_a = a.generate(8).await.unwrap().rows;
        let rows_b = b.generate(8).await.unwrap().rows;

        assert_eq!(rows_a, rows_b);
    }

    #[tokio::test]
    async fn malformed_reply_aborts_without_retry() {
        let generator = ScriptedGenerator::new("I cannot answer in JSON, sorry.");
        let builder = builder_with(generator.clone(), vec![long_passage("alpha")], 5, 1);

        let err = builder.generate(4).await.unwrap_err();

        assert!(matches!(err.source, GenerationError::Malformed(_)));
        assert_eq!(err.source.class(), ErrorClass::Permanent);
        assert_eq!(err.batches_completed, 0);
        // One generation attempt, no retries.
        assert_eq!(*generator.calls.lock(), 1);
    }

    #[tokio::test]
    async fn cache_is_written_once_and_loaded_after() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        let passages = vec![long_passage("alpha"), long_passage("beta")];

        let first = builder_with(ScriptedGenerator::pair(), passages.clone(), 5, 3);
        let generated = first.generate_cached(&path, 4).await.unwrap();
        assert_eq!(generated.len(), 4);

        // A second builder never reaches its generator; the cache answers.
        let idle = ScriptedGenerator::pair();
        let second = builder_with(idle.clone(), passages, 5, 3);
        let loaded = second.generate_cached(&path, 4).await.unwrap();

        assert_eq!(loaded, generated);
        assert_eq!(*idle.calls.lock(), 0);
    }
}
