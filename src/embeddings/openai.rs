//! OpenAI-compatible `/embeddings` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{EmbeddingError, EmbeddingProvider};

/// Connection settings for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token; omitted for unauthenticated local servers.
    pub api_key: Option<String>,
    pub model: String,
    /// Vector width the model produces.
    pub dimensions: usize,
}

/// HTTP [`EmbeddingProvider`] for hosted or local OpenAI-compatible
/// services. One request per batch, no internal retries.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiEmbeddingConfig) -> Result<Self, EmbeddingError> {
        let endpoint = join_endpoint(&config.base_url, "embeddings")?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key,
            model: config.model,
            dimensions: config.dimensions,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut payload: EmbeddingResponse = response.json().await?;
        if payload.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                requested: texts.len(),
                received: payload.data.len(),
            });
        }
        // services may answer out of order
        payload.data.sort_by_key(|row| row.index);
        Ok(payload.data.into_iter().map(|row| row.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Join `path` onto an API root, tolerating a trailing slash on the root.
pub(crate) fn join_endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut root = base.trim_end_matches('/').to_string();
    root.push('/');
    Url::parse(&root)?.join(path)
}
