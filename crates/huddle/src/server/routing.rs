//! Axum router configuration for all endpoints

use axum::{
  middleware,
  routing::{get, post},
  Router,
};

use crate::server::handlers::{qa, respond, status, upload};
use crate::server::middleware::request_context_middleware;
use crate::server::state::AppState;

/// Create the main application router
///
/// Every Q&A route answers both with and without its trailing slash.
pub fn create_router(state: AppState) -> Router {
  Router::new()
    // Status endpoints
    .route("/status", get(status::status))
    .route("/api", get(status::api_info))
    // Q&A endpoints
    .route("/context-qa/", post(qa::context_qa))
    .route("/context-qa", post(qa::context_qa))
    .route("/conversational-qa/", post(qa::conversational_qa))
    .route("/conversational-qa", post(qa::conversational_qa))
    .route("/conversational-qa/stream/", post(qa::conversational_qa_stream))
    .route("/conversational-qa/stream", post(qa::conversational_qa_stream))
    .route("/smart-respond/", post(respond::smart_respond))
    .route("/smart-respond", post(respond::smart_respond))
    // Document upload
    .route("/upload-context/", post(upload::upload_context))
    .route("/upload-context", post(upload::upload_context))
    .layer(middleware::from_fn(request_context_middleware))
    .with_state(state)
}
