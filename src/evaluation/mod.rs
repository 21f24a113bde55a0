//! Lexical evaluation of answers against a generated dataset.
//!
//! Three deterministic scores per example, every one in `0.0..=1.0`:
//!
//! - [`token_f1`] — bag-of-tokens overlap between answer and reference.
//! - [`rouge_l`] — longest-common-subsequence F1, which also rewards
//!   preserved ordering.
//! - [`context_match`] — how well the retrieved passages cover the
//!   contexts the question was originally written from.
//!
//! [`Evaluator`] runs a [`QaPipeline`] over a dataset and averages the
//! per-row scores into a summary. Scores are computed locally; no judge
//! model is involved, so evaluation costs nothing beyond the answering
//! itself.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::QaExample;
use crate::qa::QaPipeline;
use crate::types::PipelineError;

// ── Normalization and scores ────────────────────────────────────────────────

/// Articles carry no answer content and only dilute overlap scores.
const ARTICLES: &[&str] = &["a", "an", "the"];

/// Lowercase, split on anything non-alphanumeric, drop articles.
#[must_use]
pub fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !ARTICLES.contains(token))
        .map(str::to_owned)
        .collect()
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Bag-of-tokens F1 between a prediction and a reference.
///
/// Token multiplicity counts: a repeated token only matches as often as
/// the reference repeats it. Two empty texts score 1.0; one empty text
/// scores 0.0.
#[must_use]
pub fn token_f1(prediction: &str, reference: &str) -> f64 {
    let pred = normalize(prediction);
    let refr = normalize(reference);
    if pred.is_empty() && refr.is_empty() {
        return 1.0;
    }
    if pred.is_empty() || refr.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &refr {
        *counts.entry(token.as_str()).or_default() += 1;
    }
    let mut overlap = 0usize;
    for token in &pred {
        if let Some(count) = counts.get_mut(token.as_str())
            && *count > 0
        {
            *count -= 1;
            overlap += 1;
        }
    }

    f1(
        overlap as f64 / pred.len() as f64,
        overlap as f64 / refr.len() as f64,
    )
}

/// Longest common subsequence length over token slices, two rows of DP
/// state instead of the full table.
fn lcs_len(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            curr[j + 1] = if token_a == token_b {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F1 between a prediction and a reference.
#[must_use]
pub fn rouge_l(prediction: &str, reference: &str) -> f64 {
    let pred = normalize(prediction);
    let refr = normalize(reference);
    if pred.is_empty() && refr.is_empty() {
        return 1.0;
    }
    if pred.is_empty() || refr.is_empty() {
        return 0.0;
    }

    let lcs = lcs_len(&pred, &refr) as f64;
    f1(lcs / pred.len() as f64, lcs / refr.len() as f64)
}

/// Coverage of the reference contexts by the retrieved passages.
///
/// Each reference context takes the best [`token_f1`] it reaches against
/// any retrieved passage; the score is the mean over references. 1.0 when
/// there are no reference contexts to cover.
#[must_use]
pub fn context_match(retrieved: &[String], references: &[String]) -> f64 {
    if references.is_empty() {
        return 1.0;
    }
    if retrieved.is_empty() {
        return 0.0;
    }
    let total: f64 = references
        .iter()
        .map(|reference| {
            retrieved
                .iter()
                .map(|passage| token_f1(passage, reference))
                .fold(0.0, f64::max)
        })
        .sum();
    total / references.len() as f64
}

// ── Evaluator ───────────────────────────────────────────────────────────────

/// Scores for one answered example.
#[derive(Debug, Clone, Serialize)]
pub struct EvalRow {
    pub question: String,
    /// What the pipeline answered.
    pub answer: String,
    /// The dataset's reference answer.
    pub reference: String,
    pub token_f1: f64,
    pub rouge_l: f64,
    pub context_match: f64,
}

/// Mean scores over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct EvalSummary {
    pub examples: usize,
    pub token_f1: f64,
    pub rouge_l: f64,
    pub context_match: f64,
}

impl EvalSummary {
    fn from_rows(rows: &[EvalRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let n = rows.len() as f64;
        Self {
            examples: rows.len(),
            token_f1: rows.iter().map(|r| r.token_f1).sum::<f64>() / n,
            rouge_l: rows.iter().map(|r| r.rouge_l).sum::<f64>() / n,
            context_match: rows.iter().map(|r| r.context_match).sum::<f64>() / n,
        }
    }
}

/// Per-row scores plus their averages.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub rows: Vec<EvalRow>,
    pub summary: EvalSummary,
}

/// Runs a [`QaPipeline`] over a dataset and scores every answer.
pub struct Evaluator {
    pipeline: QaPipeline,
}

impl Evaluator {
    #[must_use]
    pub fn new(pipeline: QaPipeline) -> Self {
        Self { pipeline }
    }

    /// Answer and score every example, in order. The first pipeline
    /// failure aborts the run.
    pub async fn evaluate(&self, examples: &[QaExample]) -> Result<EvalReport, PipelineError> {
        let mut rows = Vec::with_capacity(examples.len());
        for example in examples {
            let outcome = self.pipeline.answer(&example.question).await?;
            let retrieved: Vec<String> = outcome
                .sources
                .iter()
                .map(|source| source.passage.text.clone())
                .collect();
            let row = EvalRow {
                token_f1: token_f1(&outcome.answer, &example.answer),
                rouge_l: rouge_l(&outcome.answer, &example.answer),
                context_match: context_match(&retrieved, &example.contexts),
                question: example.question.clone(),
                answer: outcome.answer,
                reference: example.answer.clone(),
            };
            debug!(
                question = %row.question,
                token_f1 = row.token_f1,
                rouge_l = row.rouge_l,
                context_match = row.context_match,
                "example scored"
            );
            rows.push(row);
        }

        let summary = EvalSummary::from_rows(&rows);
        info!(
            examples = summary.examples,
            token_f1 = summary.token_f1,
            rouge_l = summary.rouge_l,
            context_match = summary.context_match,
            "evaluation complete"
        );
        Ok(EvalReport { rows, summary })
    }
}
