//! Shared application state handed to every handler

use std::sync::Arc;

use crate::server::services::orchestrator::ConversationalQa;

/// Model names reported by `/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
  pub embedding_model: String,
  pub chat_model: String,
  pub respond_model: String,
}

#[derive(Clone)]
pub struct AppState {
  pub qa: Arc<ConversationalQa>,
  pub info: Arc<ServiceInfo>,
}

impl AppState {
  pub fn new(qa: ConversationalQa, info: ServiceInfo) -> Self {
    Self { qa: Arc::new(qa), info: Arc::new(info) }
  }
}
