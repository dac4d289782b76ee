//! Embedding service abstraction and its OpenAI-backed implementation

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::server::services::errors::ServiceError;
use crate::server::services::openai::{self, OpenAiSettings};

/// Turns text into fixed-length vectors. No retries happen at this layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingService: Send + Sync {
  /// Embed a single text
  async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

  /// Embed many texts, returning vectors in input order
  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints
#[derive(Clone)]
pub struct OpenAiEmbeddings {
  client: Client,
  endpoint: String,
  model: String,
  batch_size: usize,
  timeout: Duration,
}

impl OpenAiEmbeddings {
  pub fn new(settings: &OpenAiSettings, model: String, batch_size: usize) -> Result<Self> {
    anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
    anyhow::ensure!(batch_size > 0, "embedding batch size must be greater than zero");
    Ok(Self {
      client: openai::build_client(settings)?,
      endpoint: settings.endpoint("embeddings"),
      model,
      batch_size,
      timeout: settings.timeout,
    })
  }

  pub fn model(&self) -> &str {
    &self.model
  }

  async fn request_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
    let request = EmbeddingRequest { model: &self.model, input: inputs };
    let response =
      self.client.post(&self.endpoint).timeout(self.timeout).json(&request).send().await?;
    let response = openai::check_status(response).await?;
    let body = response.text().await?;
    parse_embedding_response(&body, inputs.len())
  }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddings {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
    let mut vectors = self.request_batch(&[text.to_string()]).await?;
    vectors.pop().ok_or_else(|| ServiceError::malformed("no embedding returned"))
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(self.batch_size) {
      vectors.extend(self.request_batch(batch).await?);
    }
    Ok(vectors)
  }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model: &'a str,
  input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
  index: usize,
}

/// Decode an `/embeddings` response body, restoring input order
fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, ServiceError> {
  let mut parsed: EmbeddingResponse = serde_json::from_str(body)
    .map_err(|e| ServiceError::malformed(format!("failed to parse embedding response: {e}")))?;

  parsed.data.sort_by_key(|entry| entry.index);
  if parsed.data.len() != expected {
    return Err(ServiceError::malformed(format!(
      "service returned {} embeddings for {} inputs",
      parsed.data.len(),
      expected
    )));
  }

  Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}
