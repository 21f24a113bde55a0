//! Full pipeline walkthrough against in-process collaborators.
//!
//! Chunks a small handbook, encodes it into a SQLite vector store,
//! answers a question through reranked retrieval, then generates and
//! evaluates a tiny dataset — no network, no API keys.
//!
//! Run with: `cargo run --example corpus_walkthrough`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use docsmith::chunking::{AssemblerConfig, ChunkingPipeline, EmbeddingSplitter};
use docsmith::dataset::{DatasetBuilder, DatasetConfig};
use docsmith::embeddings::{EmbeddingProvider, MockEmbeddingProvider};
use docsmith::evaluation::Evaluator;
use docsmith::generation::{GenerationError, Generator, PacingConfig};
use docsmith::ingestion::{CorpusEncoder, EncoderConfig, write_jsonl};
use docsmith::qa::QaPipeline;
use docsmith::retrieval::{RerankError, RerankScorer, RetrievalRanker, Retriever, RetrieverConfig};
use docsmith::stores::SqliteStore;

const HANDBOOK: &str = "\
# Observatory Handbook

Volunteers record every visit in the shared log before leaving the site.

## Shift Basics

Arrive thirty minutes before your slot to let your eyes adjust. The dome \
key hangs in the locker by the north door. Always sign the instrument \
sheet, even for a short session.

## Telescope Care

Cap the optics before touching the mount. Condensation is the main \
hazard in autumn, so run the dew heater whenever humidity passes seventy \
percent. Report any drive noise to the maintenance list the same night.

# Appendix

Lost keys cost twenty pounds to replace. The kettle lives in the warm room.";

/// Scores candidates by shared words with the query. Stands in for a
/// cross-encoder endpoint.
struct WordOverlapScorer;

#[async_trait]
impl RerankScorer for WordOverlapScorer {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, RerankError> {
        let query_words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                query_words
                    .iter()
                    .filter(|word| lowered.contains(word.as_str()))
                    .count() as f32
            })
            .collect())
    }

    fn name(&self) -> &str {
        "word-overlap"
    }
}

/// Answers from a fixed script keyed on prompt content. Stands in for a
/// chat-completion endpoint.
struct ScriptedGenerator;

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.contains("JSON object") {
            return Ok(
                r#"{"question": "Where does the dome key hang?", "answer": "The dome key hangs in the locker by the north door."}"#
                    .to_owned(),
            );
        }
        Ok("The dome key hangs in the locker by the north door.".to_owned())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,docsmith=debug"))
        .unwrap();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let workdir = tempfile::tempdir()?;

    info!("📚 chunking the handbook");
    let embedder = Arc::new(MockEmbeddingProvider::default());
    let chunker = ChunkingPipeline::new(AssemblerConfig {
        target_size: 40,
        min_size: 8,
        overlap: 6,
    })?
    .with_semantic_splitter(Arc::new(EmbeddingSplitter::new(embedder.clone())));
    let passages = chunker.chunk_document(HANDBOOK).await?;
    for passage in &passages {
        info!(
            heading = %passage.heading(),
            tokens = passage.token_count(),
            merged = ?passage.merged_count(),
            "passage"
        );
    }

    let corpus_path = workdir.path().join("corpus.jsonl");
    write_jsonl(&corpus_path, &passages).await?;
    info!(path = %corpus_path.display(), "corpus saved");

    info!("🗄️ encoding into sqlite");
    let store = Arc::new(
        SqliteStore::open(workdir.path().join("corpus.db"), embedder.dimensions()).await?,
    );
    let report = CorpusEncoder::new(embedder.clone(), store.clone(), EncoderConfig::default())?
        .encode(passages.clone())
        .await?;
    info!(encoded = report.encoded, batches = report.batches, "store ready");

    info!("🔎 answering through reranked retrieval");
    let ranker = RetrievalRanker::new(
        Arc::new(WordOverlapScorer),
        RetrievalRanker::DEFAULT_RERANK_K,
    )?;
    let retriever = Retriever::new(embedder, store, RetrieverConfig::default())?
        .with_ranker(ranker);
    let qa = QaPipeline::new(retriever, Arc::new(ScriptedGenerator));
    let outcome = qa.answer("Where does the dome key hang?").await?;
    info!(answer = %outcome.answer, "answer");
    for source in &outcome.sources {
        info!(
            heading = %source.passage.heading(),
            similarity = source.similarity,
            rerank = source.rerank_score,
            "source"
        );
    }

    info!("🧪 generating and evaluating a dataset");
    let corpus: Vec<docsmith::Passage> = passages;
    let builder = DatasetBuilder::new(
        Arc::new(ScriptedGenerator),
        corpus,
        DatasetConfig {
            min_passage_tokens: 8,
            seed: 7,
            pacing: PacingConfig {
                batch_size: 2,
                inter_batch_delay: Duration::from_millis(50),
                ..PacingConfig::default()
            },
        },
    )?;
    let dataset = builder
        .generate_cached(workdir.path().join("qa.jsonl"), 4)
        .await?;
    info!(examples = dataset.len(), "dataset ready");

    let eval_store = Arc::new(docsmith::stores::MemoryStore::new());
    let eval_embedder = Arc::new(MockEmbeddingProvider::default());
    let passages: Vec<docsmith::Passage> =
        docsmith::ingestion::read_jsonl(&corpus_path).await?;
    CorpusEncoder::new(eval_embedder.clone(), eval_store.clone(), EncoderConfig::default())?
        .encode(passages)
        .await?;
    let eval_retriever = Retriever::new(eval_embedder, eval_store, RetrieverConfig::default())?;
    let evaluator = Evaluator::new(QaPipeline::new(eval_retriever, Arc::new(ScriptedGenerator)));
    let report = evaluator.evaluate(&dataset).await?;
    info!(
        token_f1 = report.summary.token_f1,
        rouge_l = report.summary.rouge_l,
        context_match = report.summary.context_match,
        "evaluation summary"
    );

    Ok(())
}
