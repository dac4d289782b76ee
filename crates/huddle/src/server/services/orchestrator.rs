//! Conversational retrieval-augmented Q&A over a single transcript
//!
//! Every call is self-contained: the transcript is chunked, embedded and
//! indexed from scratch, and the chat history comes from (and goes back to)
//! the caller. Nothing is remembered between calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::server::services::chunker::{self, ChunkerConfig};
use crate::server::services::embeddings::EmbeddingService;
use crate::server::services::errors::ServiceError;
use crate::server::services::generation::GenerationService;
use crate::server::services::prompt;
use crate::server::services::retriever::{Retriever, DEFAULT_TOP_K};
use crate::server::services::streaming::{self, FragmentStream};
use crate::server::services::vector_index::{IndexError, ScoredChunk, VectorIndex};

pub const EMPTY_TRANSCRIPT: &str = "Transcript is empty. Please provide meeting text or audio.";
pub const EMPTY_QUESTION: &str = "Question is empty. Please ask something about the meeting.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QaError {
  #[error("{0}")]
  EmptyInput(&'static str),

  #[error("embedding service error: {0}")]
  Embedding(#[source] ServiceError),

  #[error("generation service error: {0}")]
  Generation(#[source] ServiceError),

  #[error("vector index has no chunks")]
  EmptyIndex,

  #[error("vector index error: {0}")]
  Index(#[source] IndexError),
}

impl From<IndexError> for QaError {
  fn from(err: IndexError) -> Self {
    match err {
      IndexError::Empty => QaError::EmptyIndex,
      other => QaError::Index(other),
    }
  }
}

/// One question/answer exchange; `[question, answer]` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ChatTurn {
  pub question: String,
  pub answer: String,
}

impl ChatTurn {
  pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
    Self { question: question.into(), answer: answer.into() }
  }
}

impl From<(String, String)> for ChatTurn {
  fn from((question, answer): (String, String)) -> Self {
    Self { question, answer }
  }
}

impl From<ChatTurn> for (String, String) {
  fn from(turn: ChatTurn) -> Self {
    (turn.question, turn.answer)
  }
}

/// Pipeline tuning shared by every request
#[derive(Debug, Clone, Copy)]
pub struct QaSettings {
  pub chunker: ChunkerConfig,
  pub top_k: usize,
}

impl Default for QaSettings {
  fn default() -> Self {
    Self { chunker: ChunkerConfig::default(), top_k: DEFAULT_TOP_K }
  }
}

/// Retrieved context plus the prompt built from it
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPrompt {
  pub context: Vec<ScoredChunk>,
  pub prompt: String,
}

/// Answer plus the caller's history extended by this turn
#[derive(Debug, Clone, PartialEq)]
pub struct QaAnswer {
  pub answer: String,
  pub chat_history: Vec<ChatTurn>,
}

pub struct ConversationalQa {
  embeddings: Arc<dyn EmbeddingService>,
  generation: Arc<dyn GenerationService>,
  responder: Arc<dyn GenerationService>,
  settings: QaSettings,
}

impl ConversationalQa {
  pub fn new(
    embeddings: Arc<dyn EmbeddingService>,
    generation: Arc<dyn GenerationService>,
    settings: QaSettings,
  ) -> Self {
    Self { embeddings, responder: generation.clone(), generation, settings }
  }

  /// Use a different model for smart replies than for Q&A
  pub fn with_responder(mut self, responder: Arc<dyn GenerationService>) -> Self {
    self.responder = responder;
    self
  }

  pub fn settings(&self) -> &QaSettings {
    &self.settings
  }

  /// Validate, chunk, embed, retrieve and assemble the prompt
  pub async fn prepare(
    &self,
    transcript: &str,
    question: &str,
    history: &[ChatTurn],
  ) -> Result<PreparedPrompt, QaError> {
    require_text(transcript, EMPTY_TRANSCRIPT)?;
    require_text(question, EMPTY_QUESTION)?;
    let question = question.trim();

    let chunks = chunker::split(transcript, &self.settings.chunker);
    if chunks.is_empty() {
      return Err(QaError::EmptyInput(EMPTY_TRANSCRIPT));
    }
    tracing::debug!("split transcript into {} chunks", chunks.len());

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = self.embeddings.embed_batch(&texts).await.map_err(QaError::Embedding)?;
    let index = VectorIndex::build(chunks, vectors)?;

    let query = self.embeddings.embed(question).await.map_err(QaError::Embedding)?;
    let retriever = Retriever::new(index, self.settings.top_k);
    let context = retriever.retrieve(&query)?;

    let prompt = prompt::qa_prompt(&context, history, question);
    tracing::debug!(history_turns = history.len(), "assembled prompt:\n{prompt}");

    Ok(PreparedPrompt { context, prompt })
  }

  /// Answer one question and return the extended history
  pub async fn answer(
    &self,
    transcript: &str,
    question: &str,
    history: &[ChatTurn],
  ) -> Result<QaAnswer, QaError> {
    let prepared = self.prepare(transcript, question, history).await?;
    let answer = self.generation.complete(&prepared.prompt).await.map_err(QaError::Generation)?;

    let mut chat_history = history.to_vec();
    chat_history.push(ChatTurn::new(question.trim(), answer.clone()));
    tracing::debug!(history_turns = chat_history.len(), "answered question");

    Ok(QaAnswer { answer, chat_history })
  }

  /// Single-turn variant without history
  pub async fn context_answer(&self, transcript: &str, question: &str) -> Result<String, QaError> {
    let prepared = self.prepare(transcript, question, &[]).await?;
    self.generation.complete(&prepared.prompt).await.map_err(QaError::Generation)
  }

  /// Answer one question as a stream of text fragments
  pub async fn answer_stream(
    &self,
    transcript: &str,
    question: &str,
    history: &[ChatTurn],
  ) -> Result<FragmentStream, QaError> {
    let prepared = self.prepare(transcript, question, history).await?;
    let tokens = self.generation.stream(&prepared.prompt).await.map_err(QaError::Generation)?;
    Ok(streaming::fragments(tokens))
  }

  /// Reply to the meeting directly, without retrieval
  pub async fn smart_respond(&self, transcript: &str, role: Option<&str>) -> Result<String, QaError> {
    require_text(transcript, EMPTY_TRANSCRIPT)?;
    let prompt = prompt::smart_reply_prompt(role, transcript);
    tracing::debug!("smart reply prompt:\n{prompt}");
    self.responder.complete(&prompt).await.map_err(QaError::Generation)
  }
}

fn require_text(text: &str, message: &'static str) -> Result<(), QaError> {
  if text.trim().is_empty() {
    return Err(QaError::EmptyInput(message));
  }
  Ok(())
}
