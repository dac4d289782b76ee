//! Status and API description handlers

use axum::extract::{Json, State};
use schemars::{schema_for, JsonSchema};

use crate::server::state::AppState;
use crate::server::types::{
  ApiInfoResponse, ContextQaRequest, ConversationalQaRequest, EndpointInfo, SmartRespondRequest,
  StatusResponse,
};

/// GET /status - Health check endpoint
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
  Json(StatusResponse {
    status: "healthy".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    embedding_model: state.info.embedding_model.clone(),
    chat_model: state.info.chat_model.clone(),
    respond_model: state.info.respond_model.clone(),
  })
}

/// GET /api - Lists the routes and the schemas of their request bodies
pub async fn api_info() -> Json<ApiInfoResponse> {
  let endpoints = vec![
    endpoint("GET", "/status", None),
    endpoint("GET", "/api", None),
    endpoint("POST", "/context-qa/", Some(schema::<ContextQaRequest>())),
    endpoint("POST", "/conversational-qa/", Some(schema::<ConversationalQaRequest>())),
    endpoint("POST", "/conversational-qa/stream/", Some(schema::<ConversationalQaRequest>())),
    endpoint("POST", "/smart-respond/", Some(schema::<SmartRespondRequest>())),
    endpoint("POST", "/upload-context/", None),
  ];

  Json(ApiInfoResponse { version: env!("CARGO_PKG_VERSION").to_string(), endpoints })
}

fn endpoint(method: &str, path: &str, request_schema: Option<serde_json::Value>) -> EndpointInfo {
  EndpointInfo { method: method.to_string(), path: path.to_string(), request_schema }
}

fn schema<T: JsonSchema>() -> serde_json::Value {
  serde_json::to_value(schema_for!(T)).unwrap_or(serde_json::Value::Null)
}
