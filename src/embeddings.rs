use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
/// Cap on error-body bytes kept for diagnostics; API error pages can be huge.
const MAX_ERROR_BODY_CHARS: usize = 2000;

/// Failure modes of a single embedding call. Callers decide retry policy;
/// nothing here retries on its own.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("OPENAI_API_KEY is required for embeddings")]
    MissingApiKey,
    #[error("embeddings API failed with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("embeddings API returned unexpected response shape")]
    BadResponse,
    #[error("embeddings request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Seam between the indexer/search and the embedding provider, so tests can
/// substitute a local implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded alongside each embedding.
    fn model(&self) -> &str;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embedding client for the OpenAI `/v1/embeddings` endpoint. One batched
/// POST per call; the configured timeout cancels the in-flight request.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Fails with [`EmbeddingError::MissingApiKey`] before any network I/O
    /// when no credential is supplied.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key
            .filter(|key| !key.is_empty())
            .ok_or(EmbeddingError::MissingApiKey)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            model: model.into(),
            client,
        })
    }

    pub fn from_env(model: impl Into<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        Self::new(std::env::var("OPENAI_API_KEY").ok(), model, timeout)
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Option<Vec<f32>>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|_| EmbeddingError::BadResponse)?;
        let vectors: Vec<Vec<f32>> = parsed
            .data
            .into_iter()
            .filter_map(|row| row.embedding)
            .collect();

        // Count mismatch means silently truncating or padding would
        // desynchronize vectors from their source texts.
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::BadResponse);
        }
        Ok(vectors)
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
