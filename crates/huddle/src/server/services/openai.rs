//! Shared HTTP plumbing for OpenAI-compatible endpoints

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};

use crate::server::services::errors::ServiceError;

/// Connection settings shared by the embedding and chat clients
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
  pub api_key: String,
  pub base_url: String,
  pub timeout: Duration,
}

impl OpenAiSettings {
  pub fn endpoint(&self, path: &str) -> String {
    format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
  }
}

/// Build a pooled client that sends the bearer token on every request.
///
/// `timeout` bounds connecting and each read, so a streamed answer may run
/// as long as fragments keep arriving. Whole-response callers should add
/// their own per-request deadline.
pub fn build_client(settings: &OpenAiSettings) -> Result<Client> {
  anyhow::ensure!(!settings.api_key.trim().is_empty(), "missing OpenAI API key");

  let mut headers = HeaderMap::new();
  let auth = format!("Bearer {}", settings.api_key.trim());
  headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid OpenAI API key")?);
  headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

  Client::builder()
    .connect_timeout(settings.timeout)
    .read_timeout(settings.timeout)
    .default_headers(headers)
    .build()
    .context("failed to build OpenAI HTTP client")
}

/// Pass successful responses through, turn everything else into a ServiceError
pub async fn check_status(response: Response) -> Result<Response, ServiceError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
  Err(ServiceError::from_status(status, body))
}
