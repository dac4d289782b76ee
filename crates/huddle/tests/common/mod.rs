//! Deterministic service doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use huddle::server::services::embeddings::EmbeddingService;
use huddle::server::services::errors::ServiceError;
use huddle::server::services::generation::{GenerationService, TokenStream};
use huddle::server::services::orchestrator::{ConversationalQa, QaSettings};
use huddle::server::state::{AppState, ServiceInfo};

/// Terms counted by [`KeywordEmbeddings`], one dimension each
pub const VOCABULARY: [&str; 6] = ["faiss", "langchain", "framework", "vector", "search", "library"];

/// Embeds text as keyword counts and records every call
#[derive(Default)]
pub struct KeywordEmbeddings {
  pub single_calls: AtomicUsize,
  pub batch_calls: AtomicUsize,
  pub batches: Mutex<Vec<Vec<String>>>,
}

impl KeywordEmbeddings {
  pub fn vector(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    VOCABULARY.iter().map(|term| text.matches(term).count() as f32).collect()
  }

  pub fn calls(&self) -> usize {
    self.single_calls.load(Ordering::SeqCst) + self.batch_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl EmbeddingService for KeywordEmbeddings {
  async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
    self.single_calls.fetch_add(1, Ordering::SeqCst);
    Ok(Self::vector(text))
  }

  async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
    self.batch_calls.fetch_add(1, Ordering::SeqCst);
    self.batches.lock().unwrap().push(texts.to_vec());
    Ok(texts.iter().map(|text| Self::vector(text)).collect())
  }
}

/// Embedding double whose provider is always unreachable
#[derive(Default)]
pub struct UnreachableEmbeddings {
  pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingService for UnreachableEmbeddings {
  async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Err(ServiceError::transport("connection refused"))
  }

  async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Err(ServiceError::transport("connection refused"))
  }
}

/// Answers with the prompt it was given, streamed in fixed fragments
#[derive(Default)]
pub struct EchoGeneration {
  pub prompts: Mutex<Vec<String>>,
  /// Fragments to stream instead of the echoed prompt
  pub scripted: Mutex<Option<Vec<Result<String, ServiceError>>>>,
}

impl EchoGeneration {
  pub fn scripted(fragments: Vec<Result<String, ServiceError>>) -> Self {
    Self { prompts: Mutex::default(), scripted: Mutex::new(Some(fragments)) }
  }

  pub fn calls(&self) -> usize {
    self.prompts.lock().unwrap().len()
  }

  pub fn last_prompt(&self) -> Option<String> {
    self.prompts.lock().unwrap().last().cloned()
  }
}

#[async_trait]
impl GenerationService for EchoGeneration {
  async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
    self.prompts.lock().unwrap().push(prompt.to_string());
    Ok(prompt.to_string())
  }

  async fn stream(&self, prompt: &str) -> Result<TokenStream, ServiceError> {
    self.prompts.lock().unwrap().push(prompt.to_string());
    let fragments = match self.scripted.lock().unwrap().take() {
      Some(fragments) => fragments,
      None => prompt.split_inclusive('\n').map(|line| Ok(line.to_string())).collect(),
    };
    Ok(stream::iter(fragments).boxed())
  }
}

pub struct Harness {
  pub embeddings: Arc<KeywordEmbeddings>,
  pub generation: Arc<EchoGeneration>,
  pub qa: ConversationalQa,
}

pub fn harness(settings: QaSettings) -> Harness {
  harness_with(Arc::new(EchoGeneration::default()), settings)
}

pub fn harness_with(generation: Arc<EchoGeneration>, settings: QaSettings) -> Harness {
  let embeddings = Arc::new(KeywordEmbeddings::default());
  let qa = ConversationalQa::new(embeddings.clone(), generation.clone(), settings);
  Harness { embeddings, generation, qa }
}

pub fn app_state(qa: ConversationalQa) -> AppState {
  AppState::new(
    qa,
    ServiceInfo {
      embedding_model: "keyword-test".to_string(),
      chat_model: "echo-test".to_string(),
      respond_model: "echo-reply-test".to_string(),
    },
  )
}
