//! Chat-completion client for OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationError, Generator};
use crate::embeddings::openai::join_endpoint;

/// Connection settings for [`OpenAiGenerator`].
#[derive(Debug, Clone)]
pub struct OpenAiGeneratorConfig {
    /// API root, e.g. `https://api.openai.com/v1/`.
    pub base_url: String,
    /// Bearer token; omitted for local servers that accept anonymous calls.
    pub api_key: Option<String>,
    /// Model identifier passed through verbatim.
    pub model: String,
    /// Sampling temperature; keep low for grounded answers.
    pub temperature: f32,
}

impl Default for OpenAiGeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1/".to_owned(),
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.1,
        }
    }
}

/// [`Generator`] backed by a `chat/completions` endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: OpenAiGeneratorConfig,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("temperature", &self.config.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiGenerator {
    #[must_use]
    pub fn new(config: OpenAiGeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let endpoint = join_endpoint(&self.config.base_url, "chat/completions")?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let mut call = self.client.post(endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response.json().await?;
        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyResponse)?;
        Ok(choice.message.content)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
