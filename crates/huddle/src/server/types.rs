//! REST API types with schemars annotations for schema generation

use axum::{http::StatusCode, response::Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::server::services::extract::ExtractError;
use crate::server::services::orchestrator::{ChatTurn, QaError};

/// Handler result: JSON payload, or a status code with an error body
pub type ApiResult<T> = Result<Json<T>, ApiFailure>;

pub type ApiFailure = (StatusCode, Json<ErrorResponse>);

// Errors
// ======

/// Body of every failed request
#[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorResponse {
  /// Human readable error message
  pub error: String,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self { error: error.into() }
  }
}

pub fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
  (status, Json(ErrorResponse::new(message)))
}

/// Status code a Q&A failure is reported with
pub fn qa_status(err: &QaError) -> StatusCode {
  match err {
    QaError::EmptyInput(_) => StatusCode::BAD_REQUEST,
    QaError::Embedding(_) | QaError::Generation(_) => StatusCode::BAD_GATEWAY,
    QaError::EmptyIndex | QaError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl From<QaError> for ErrorResponse {
  fn from(err: QaError) -> Self {
    Self::new(err.to_string())
  }
}

pub fn qa_failure(err: QaError) -> ApiFailure {
  (qa_status(&err), Json(err.into()))
}

pub fn extract_failure(err: ExtractError) -> ApiFailure {
  let status = match err {
    ExtractError::UnsupportedFormat(_) | ExtractError::Extraction { .. } => StatusCode::BAD_REQUEST,
    ExtractError::Interrupted => StatusCode::INTERNAL_SERVER_ERROR,
  };
  failure(status, err.to_string())
}

// Q&A Endpoints
// =============

/// Request for /context-qa/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ContextQaRequest {
  /// Full meeting transcript
  pub transcript: String,

  /// Question about the transcript
  pub question: String,
}

/// Request for /conversational-qa/ and its streaming variant
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConversationalQaRequest {
  /// Full meeting transcript
  pub transcript: String,

  /// Question about the transcript
  pub question: String,

  /// Prior `[question, answer]` pairs, oldest first
  #[serde(default)]
  #[schemars(with = "Vec<(String, String)>")]
  pub chat_history: Vec<ChatTurn>,
}

/// Response for /context-qa/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnswerResponse {
  pub answer: String,
}

/// Response for /conversational-qa/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConversationalQaResponse {
  pub answer: String,

  /// Input history with this exchange appended
  #[schemars(with = "Vec<(String, String)>")]
  pub chat_history: Vec<ChatTurn>,
}

// Smart Reply Endpoint
// ====================

/// Request for /smart-respond/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SmartRespondRequest {
  /// Meeting transcript to reply to
  pub transcript: String,

  /// Persona instruction; a default persona is used when absent
  #[serde(default)]
  pub role: Option<String>,
}

/// Response for /smart-respond/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SmartRespondResponse {
  pub response: String,
}

// Upload Endpoint
// ===============

/// Response for /upload-context/
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UploadResponse {
  /// Plain text extracted from the uploaded document
  pub context_text: String,
}

// Status Endpoints
// ================

/// Response for /status
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  pub embedding_model: String,
  pub chat_model: String,

  /// Model writing smart replies
  pub respond_model: String,
}

/// Response for /api
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiInfoResponse {
  /// Current API version
  pub version: String,

  pub endpoints: Vec<EndpointInfo>,
}

/// One route and the schema of its request body
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EndpointInfo {
  pub method: String,
  pub path: String,

  /// JSON schema of the body, absent for GET and multipart routes
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_schema: Option<serde_json::Value>,
}
