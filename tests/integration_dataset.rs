//! Dataset generation and evaluation against a chunked corpus.
//!
//! Exercises the paced generation path with a transient hiccup, the JSONL
//! dataset cache, and a full evaluation round over the cached dataset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use docsmith::chunking::{AssemblerConfig, ChunkingPipeline};
use docsmith::dataset::{DatasetBuilder, DatasetConfig, QaExample};
use docsmith::embeddings::MockEmbeddingProvider;
use docsmith::evaluation::Evaluator;
use docsmith::generation::{GenerationError, Generator, PacingConfig};
use docsmith::ingestion::{CorpusEncoder, EncoderConfig};
use docsmith::passage::Passage;
use docsmith::qa::QaPipeline;
use docsmith::retrieval::{Retriever, RetrieverConfig};
use docsmith::stores::MemoryStore;

const PAIR_JSON: &str = r#"{"question": "What starts the count?", "answer": "Counts start an hour before high water."}"#;

fn sample_markdown() -> &'static str {
    "# Field Guide\n\n\
     Shore birds gather where the tide turns. Counts start an hour before \
     high water.\n\n\
     ## Larks\n\n\
     Larks sing at first light. Their song carries over open fields. The \
     dawn chorus peaks in late spring, when territories are contested.\n\n\
     ## Owls\n\n\
     Owls hunt after dusk. Silent flight makes them hard to notice. Barn \
     owls prefer open farmland with rough grass margins near water."
}

async fn chunk_sample() -> Vec<Passage> {
    let pipeline = ChunkingPipeline::new(AssemblerConfig {
        target_size: 18,
        min_size: 4,
        overlap: 0,
    })
    .unwrap();
    pipeline.chunk_document(sample_markdown()).await.unwrap()
}

fn quick_pacing() -> PacingConfig {
    PacingConfig {
        batch_size: 2,
        inter_batch_delay: Duration::ZERO,
        max_retries: 3,
        retry_base_delay: Duration::ZERO,
        retry_backoff: 1.0,
    }
}

/// Fails the first call with a rate limit, then answers with a fixed pair.
struct FlakyPairGenerator {
    failures_left: Mutex<u32>,
}

#[async_trait]
impl Generator for FlakyPairGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        let mut left = self.failures_left.lock();
        if *left > 0 {
            *left -= 1;
            return Err(GenerationError::Api {
                status: 429,
                body: "rate limit exceeded".to_owned(),
            });
        }
        Ok(PAIR_JSON.to_owned())
    }

    fn name(&self) -> &str {
        "flaky-pair"
    }
}

/// Refuses every prompt; proves the cache is consulted first.
struct RefusingGenerator;

#[async_trait]
impl Generator for RefusingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Malformed("should never be called".to_owned()))
    }

    fn name(&self) -> &str {
        "refusing"
    }
}

/// Always answers with the fixture's reference answer.
struct ReferenceGenerator;

#[async_trait]
impl Generator for ReferenceGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok("Counts start an hour before high water.".to_owned())
    }

    fn name(&self) -> &str {
        "reference"
    }
}

#[tokio::test]
async fn dataset_survives_a_transient_hiccup_and_caches() {
    let passages = chunk_sample().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("qa.jsonl");

    let builder = DatasetBuilder::new(
        Arc::new(FlakyPairGenerator {
            failures_left: Mutex::new(1),
        }),
        passages.clone(),
        DatasetConfig {
            min_passage_tokens: 4,
            seed: 21,
            pacing: quick_pacing(),
        },
    )
    .unwrap();

    let rows = builder.generate_cached(&cache, 5).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert!(tokio::fs::try_exists(&cache).await.unwrap());

    // A fresh builder with a generator that always fails still succeeds,
    // because the cache answers before any generation happens.
    let cached_builder = DatasetBuilder::new(
        Arc::new(RefusingGenerator),
        passages,
        DatasetConfig {
            min_passage_tokens: 4,
            seed: 21,
            pacing: quick_pacing(),
        },
    )
    .unwrap();
    let reloaded = cached_builder.generate_cached(&cache, 5).await.unwrap();

    assert_eq!(reloaded, rows);
}

#[tokio::test]
async fn cached_dataset_evaluates_cleanly() {
    let passages = chunk_sample().await;
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("qa.jsonl");

    let builder = DatasetBuilder::new(
        Arc::new(FlakyPairGenerator {
            failures_left: Mutex::new(0),
        }),
        passages.clone(),
        DatasetConfig {
            min_passage_tokens: 4,
            seed: 8,
            pacing: quick_pacing(),
        },
    )
    .unwrap();
    let examples: Vec<QaExample> = builder.generate_cached(&cache, 4).await.unwrap();

    let embedder = Arc::new(MockEmbeddingProvider::default());
    let store = Arc::new(MemoryStore::new());
    let encoder = CorpusEncoder::new(embedder.clone(), store.clone(), EncoderConfig::default())
        .unwrap();
    encoder.encode(passages).await.unwrap();

    let retriever = Retriever::new(embedder, store, RetrieverConfig::default()).unwrap();
    let pipeline = QaPipeline::new(retriever, Arc::new(ReferenceGenerator));
    let report = Evaluator::new(pipeline).evaluate(&examples).await.unwrap();

    assert_eq!(report.summary.examples, 4);
    // Every generated answer equals the reference answer verbatim.
    assert!((report.summary.token_f1 - 1.0).abs() < 1e-9);
    assert!((report.summary.rouge_l - 1.0).abs() < 1e-9);
    // The corpus is small enough that retrieval returns it whole, so the
    // sampled contexts are always covered.
    assert!((report.summary.context_match - 1.0).abs() < 1e-9);
}
