//! REST server startup and configuration

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, serve};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::server::routing::create_router;

/// Start the REST server and run until interrupted
pub async fn start_server(config: ServerConfig) -> Result<()> {
  config.validate()?;
  let state = config.build_state()?;

  tracing::info!(
    "Using embedding model {}, chat model {}, reply model {}",
    config.embedding_model,
    config.chat_model,
    config.respond_model
  );

  let app = create_router(state).layer(
    ServiceBuilder::new()
      .layer(TraceLayer::new_for_http())
      .layer(CorsLayer::permissive())
      .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
  );

  let listener =
    TcpListener::bind(config.bind).await.with_context(|| format!("failed to bind {}", config.bind))?;
  tracing::info!("Server listening on {}", config.bind);

  serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;
  tracing::info!("Server shutdown gracefully");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("failed to listen for shutdown signal: {e}");
    std::future::pending::<()>().await;
  }
}
