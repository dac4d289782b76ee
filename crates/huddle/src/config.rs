//! Server configuration from command-line flags and environment variables

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use crate::server::services::chunker::{ChunkerConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::server::services::embeddings::OpenAiEmbeddings;
use crate::server::services::generation::{GenerationParams, OpenAiChat};
use crate::server::services::openai::OpenAiSettings;
use crate::server::services::orchestrator::{ConversationalQa, QaSettings};
use crate::server::services::retriever::DEFAULT_TOP_K;
use crate::server::state::{AppState, ServiceInfo};

#[derive(Parser, Debug, Clone)]
#[command(name = "huddle_server")]
#[command(about = "Meeting transcript Q&A REST server")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
pub struct ServerConfig {
  /// Server bind address
  #[arg(long, env = "HUDDLE_BIND", default_value = "127.0.0.1:8000")]
  pub bind: SocketAddr,

  /// API key for the OpenAI-compatible provider
  #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
  pub openai_api_key: String,

  #[arg(long, env = "HUDDLE_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
  pub openai_base_url: String,

  #[arg(long, env = "HUDDLE_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
  pub embedding_model: String,

  /// Model answering transcript questions
  #[arg(long, env = "HUDDLE_CHAT_MODEL", default_value = "gpt-3.5-turbo")]
  pub chat_model: String,

  /// Model writing smart replies
  #[arg(long, env = "HUDDLE_RESPOND_MODEL", default_value = "gpt-4")]
  pub respond_model: String,

  #[arg(long, env = "HUDDLE_TEMPERATURE", default_value_t = 0.0)]
  pub temperature: f32,

  #[arg(long, env = "HUDDLE_MAX_TOKENS", default_value_t = 512)]
  pub max_tokens: usize,

  /// Characters per transcript chunk
  #[arg(long, env = "HUDDLE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
  pub chunk_size: usize,

  /// Characters shared by consecutive chunks
  #[arg(long, env = "HUDDLE_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
  pub chunk_overlap: usize,

  /// Chunks retrieved per question
  #[arg(long, env = "HUDDLE_TOP_K", default_value_t = DEFAULT_TOP_K)]
  pub top_k: usize,

  /// Texts per embedding request
  #[arg(long, env = "HUDDLE_EMBEDDING_BATCH", default_value_t = 32)]
  pub batch_size: usize,

  /// Provider connect and read timeout, and total deadline for non-streaming calls, in seconds
  #[arg(long, env = "HUDDLE_TIMEOUT_SECS", default_value_t = 60)]
  pub timeout_secs: u64,

  /// Largest accepted request body, in bytes
  #[arg(long, env = "HUDDLE_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
  pub max_upload_bytes: usize,

  /// Enable verbose logging
  #[arg(short, long)]
  pub verbose: bool,
}

impl ServerConfig {
  /// Reject settings that would fail later, before anything is bound
  pub fn validate(&self) -> Result<()> {
    if self.openai_api_key.trim().is_empty() {
      bail!("OPENAI_API_KEY is empty; set it to a valid API key");
    }
    if self.top_k == 0 {
      bail!("--top-k must be at least 1");
    }
    if self.batch_size == 0 {
      bail!("--batch-size must be at least 1");
    }
    self.chunker()?;
    Ok(())
  }

  pub fn chunker(&self) -> Result<ChunkerConfig> {
    Ok(ChunkerConfig::new(self.chunk_size, self.chunk_overlap)?)
  }

  pub fn openai(&self) -> OpenAiSettings {
    OpenAiSettings {
      api_key: self.openai_api_key.clone(),
      base_url: self.openai_base_url.clone(),
      timeout: Duration::from_secs(self.timeout_secs),
    }
  }

  pub fn generation_params(&self) -> GenerationParams {
    GenerationParams { temperature: self.temperature, max_tokens: self.max_tokens }
  }

  /// Build the provider clients and the shared handler state
  pub fn build_state(&self) -> Result<AppState> {
    let openai = self.openai();
    let embeddings = OpenAiEmbeddings::new(&openai, self.embedding_model.clone(), self.batch_size)?;
    let chat = OpenAiChat::new(&openai, self.chat_model.clone(), self.generation_params())?;
    let responder = OpenAiChat::new(&openai, self.respond_model.clone(), self.generation_params())?;

    let info = ServiceInfo {
      embedding_model: embeddings.model().to_string(),
      chat_model: chat.model().to_string(),
      respond_model: responder.model().to_string(),
    };

    let settings = QaSettings { chunker: self.chunker()?, top_k: self.top_k };
    let qa = ConversationalQa::new(Arc::new(embeddings), Arc::new(chat), settings)
      .with_responder(Arc::new(responder));

    Ok(AppState::new(qa, info))
  }

  /// Log filter used unless `RUST_LOG` is set
  pub fn default_log_filter(&self) -> &'static str {
    if self.verbose {
      "info,huddle=debug"
    } else {
      "huddle=info,tower_http=warn,warn"
    }
  }
}
