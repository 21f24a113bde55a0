//! Paced batch driving with classified retry.
//!
//! Long generation runs against rate-limited endpoints fail in two ways:
//! pressure that passes (rate limits, flaky transport) and defects that do
//! not (bad payloads, auth). [`PacedBatchRunner`] tells them apart and only
//! spends retry budget on the first kind.
//!
//! # Execution model
//!
//! 1. Work proceeds in batches of `min(batch_size, remaining)` until the
//!    requested total is accounted for.
//! 2. Batches run strictly one at a time; `inter_batch_delay` elapses
//!    between consecutive batches, never after the last.
//! 3. A failed batch retries only while its error classifies as
//!    [`ErrorClass::Transient`] and retry budget remains; the wait before
//!    retry `n` (1-based) is `retry_base_delay * retry_backoff^(n-1)`.
//! 4. A permanent failure, or an exhausted budget, aborts the run; rows
//!    from batches that already completed ride back in the error.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::GenerationError;
use crate::types::ConfigError;

// ── Classification ──────────────────────────────────────────────────────────

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Pressure that tends to pass: back off and retry.
    Transient,
    /// A defect that will not heal on its own: abort.
    Permanent,
}

/// Message fragments that mark a failure as transient. Matched
/// case-insensitively, so entries stay lowercase.
const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "429",
    "timeout",
    "connection",
    "temporarily unavailable",
    "internal server error",
    "service unavailable",
    "upstream connect error",
];

/// Classify an error message by its text.
///
/// Unknown failure shapes classify as [`ErrorClass::Permanent`]: retrying
/// a defect burns budget without progress, while a mislabeled transient
/// failure costs one aborted run that the caller can restart.
#[must_use]
pub fn classify(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    if TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Pacing and retry settings for [`PacedBatchRunner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    /// Upper bound on rows requested per batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub inter_batch_delay: Duration,
    /// Retry budget per batch; each batch starts with a fresh count.
    pub max_retries: u32,
    /// Wait before the first retry of a batch.
    pub retry_base_delay: Duration,
    /// Multiplier applied to the wait on every further retry.
    pub retry_backoff: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            inter_batch_delay: Duration::from_secs(5),
            max_retries: 5,
            retry_base_delay: Duration::from_secs(15),
            retry_backoff: 2.0,
        }
    }
}

impl PacingConfig {
    /// Reject settings that would stall or shrink the backoff.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroCount { name: "batch_size" });
        }
        if self.retry_backoff < 1.0 {
            return Err(ConfigError::BackoffBelowOne {
                value: self.retry_backoff,
            });
        }
        Ok(())
    }

    /// Wait before retrying a batch that has already failed `failures` times.
    fn retry_delay(&self, failures: u32) -> Duration {
        self.retry_base_delay
            .mul_f64(self.retry_backoff.powi(failures as i32))
    }
}

// ── Jobs and outcomes ───────────────────────────────────────────────────────

/// Produces one batch of rows on demand.
///
/// Implementors may legitimately return fewer rows than asked (a model that
/// under-delivers); the runner logs the gap and keeps its own accounting by
/// requested count, so the run still terminates.
#[async_trait]
pub trait BatchJob: Send + Sync {
    type Row: Send;

    /// Produce up to `count` rows. Called once per attempt.
    async fn run_batch(&self, count: usize) -> Result<Vec<Self::Row>, GenerationError>;
}

/// Accounting for a run that completed.
#[derive(Debug, Clone, PartialEq)]
pub struct PacedRun<T> {
    /// Rows from every batch, in batch order.
    pub rows: Vec<T>,
    /// Batches that completed.
    pub batches: usize,
    /// Retries spent across the whole run.
    pub retries: u32,
}

/// A run that aborted. Rows from batches that completed before the abort
/// survive here so a long run is never a total loss.
#[derive(Debug, thiserror::Error)]
#[error("paced run aborted after {batches_completed} completed batches: {source}")]
pub struct PacedRunError<T: std::fmt::Debug> {
    /// Rows accumulated before the failing batch.
    pub rows: Vec<T>,
    /// Batches that completed before the abort.
    pub batches_completed: usize,
    /// The failure that ended the run.
    #[source]
    pub source: GenerationError,
}

// ── Runner ──────────────────────────────────────────────────────────────────

/// Drives a [`BatchJob`] to a requested total under [`PacingConfig`].
#[derive(Debug, Clone)]
pub struct PacedBatchRunner {
    config: PacingConfig,
}

impl PacedBatchRunner {
    pub fn new(config: PacingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Run `job` until `total` rows have been requested.
    pub async fn run<J: BatchJob>(
        &self,
        total: usize,
        job: &J,
    ) -> Result<PacedRun<J::Row>, PacedRunError<J::Row>>
    where
        J::Row: std::fmt::Debug,
    {
        let mut rows: Vec<J::Row> = Vec::with_capacity(total);
        let mut batches = 0usize;
        let mut retries = 0u32;
        let mut remaining = total;

        while remaining > 0 {
            if batches > 0 {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }

            let requested = remaining.min(self.config.batch_size);
            let mut failures = 0u32;
            let produced = loop {
                match job.run_batch(requested).await {
                    Ok(produced) => break produced,
                    Err(err) => {
                        if err.class() == ErrorClass::Permanent
                            || failures >= self.config.max_retries
                        {
                            warn!(
                                batch = batches + 1,
                                failures,
                                error = %err,
                                "aborting paced run"
                            );
                            return Err(PacedRunError {
                                rows,
                                batches_completed: batches,
                                source: err,
                            });
                        }
                        let delay = self.config.retry_delay(failures);
                        failures += 1;
                        retries += 1;
                        warn!(
                            batch = batches + 1,
                            retry = failures,
                            max_retries = self.config.max_retries,
                            delay_secs = delay.as_secs_f64(),
                            error = %err,
                            "transient batch failure; backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            };

            if produced.len() != requested {
                warn!(
                    batch = batches + 1,
                    requested,
                    produced = produced.len(),
                    "batch returned a different row count than requested"
                );
            }
            rows.extend(produced);
            remaining -= requested;
            batches += 1;
            info!(batch = batches, requested, remaining, "batch complete");
        }

        Ok(PacedRun {
            rows,
            batches,
            retries,
        })
    }
}
