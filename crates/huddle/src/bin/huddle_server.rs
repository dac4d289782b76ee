//! Huddle REST Server
//!
//! HTTP API for asking questions about meeting transcripts, streaming answers,
//! drafting smart replies and extracting text from uploaded documents.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use huddle::config::ServerConfig;
use huddle::server::startup::start_server;

#[tokio::main]
async fn main() -> Result<()> {
  let config = ServerConfig::parse();

  // RUST_LOG wins over the built-in filters
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  config.validate()?;

  tracing::info!("Starting Huddle REST Server v{}", env!("CARGO_PKG_VERSION"));
  tracing::info!("Binding to address: {}", config.bind);

  start_server(config).await?;

  Ok(())
}
