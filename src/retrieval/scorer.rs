//! Cross-encoder scoring seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::RerankError;
use crate::embeddings::openai::join_endpoint;

/// Scores query/text relevance with a cross-encoder.
///
/// One call scores a whole batch; result `i` is the relevance of text `i`
/// to the query. Higher is more relevant. Implementations never retry.
#[async_trait]
pub trait RerankScorer: Send + Sync {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, RerankError>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

/// Connection settings for a hosted `/rerank` endpoint (Jina/Cohere wire
/// shape).
#[derive(Debug, Clone)]
pub struct HttpRerankScorerConfig {
    /// API root, e.g. `https://api.jina.ai/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// HTTP [`RerankScorer`] for hosted cross-encoder services.
pub struct HttpRerankScorer {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
}

impl std::fmt::Debug for HttpRerankScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRerankScorer")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpRerankScorer {
    pub fn new(config: HttpRerankScorerConfig) -> Result<Self, RerankError> {
        let endpoint = join_endpoint(&config.base_url, "rerank")?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankRow>,
}

#[derive(Deserialize)]
struct RerankRow {
    index: usize,
    relevance_score: f32,
}

#[async_trait]
impl RerankScorer for HttpRerankScorer {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, RerankError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint.clone()).json(&RerankRequest {
            model: &self.model,
            query,
            documents: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RerankError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: RerankResponse = response.json().await?;
        if payload.results.len() != texts.len() {
            return Err(RerankError::CountMismatch {
                sent: texts.len(),
                received: payload.results.len(),
            });
        }

        // answers arrive sorted by relevance; restore input order
        let mut scores = vec![0.0f32; texts.len()];
        for row in payload.results {
            if row.index >= scores.len() {
                return Err(RerankError::CountMismatch {
                    sent: texts.len(),
                    received: row.index + 1,
                });
            }
            scores[row.index] = row.relevance_score;
        }
        Ok(scores)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
