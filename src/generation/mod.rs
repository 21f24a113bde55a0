//! LLM generation seam and paced batch driving.
//!
//! [`Generator`] is the single opaque surface for text generation; the
//! OpenAI-compatible client and test mocks implement it. Generators never
//! retry — retry policy lives in [`PacedBatchRunner`](pacing::PacedBatchRunner)
//! alone, driven by the transient/permanent [`classify`](pacing::classify)
//! split.

pub mod openai;
pub mod pacing;

use std::sync::Arc;

use async_trait::async_trait;

pub use openai::{OpenAiGenerator, OpenAiGeneratorConfig};
pub use pacing::{
    BatchJob, ErrorClass, PacedBatchRunner, PacedRun, PacedRunError, PacingConfig, classify,
};

/// Shared handle for generator trait objects.
pub type SharedGenerator = Arc<dyn Generator>;

/// Failure raised by a generation collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Transport-level failure reaching the endpoint.
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("generation endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The endpoint answered success but carried no completion.
    #[error("generation response had no choices")]
    EmptyResponse,

    /// Generated output that callers could not parse into rows.
    #[error("malformed generated payload: {0}")]
    Malformed(String),

    /// The endpoint URL could not be built.
    #[error("invalid generation endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl GenerationError {
    /// Transient/permanent classification of this failure.
    ///
    /// Transport timeouts and connect failures are transient regardless of
    /// their message; everything else classifies by error text via
    /// [`classify`](pacing::classify).
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        if let GenerationError::Http(err) = self
            && (err.is_timeout() || err.is_connect())
        {
            return ErrorClass::Transient;
        }
        pacing::classify(&self.to_string())
    }
}

/// Completes prompts into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`. One attempt, no internal retries.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}
