//! Transcript question answering handlers

use std::convert::Infallible;

use axum::{
  body::Body,
  extract::{rejection::JsonRejection, Extension, Json, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
};
use futures::StreamExt;

use crate::server::handlers::json_failure;
use crate::server::middleware::RequestContext;
use crate::server::services::streaming::{self, FragmentStream};
use crate::server::state::AppState;
use crate::server::types::{
  qa_failure, qa_status, AnswerResponse, ApiResult, ContextQaRequest, ConversationalQaRequest,
  ConversationalQaResponse,
};

/// POST /context-qa/ - Answer a single question about a transcript
pub async fn context_qa(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  request: Result<Json<ContextQaRequest>, JsonRejection>,
) -> ApiResult<AnswerResponse> {
  let Json(request) = request.map_err(json_failure)?;

  match state.qa.context_answer(&request.transcript, &request.question).await {
    Ok(answer) => Ok(Json(AnswerResponse { answer })),
    Err(e) => {
      context.log_failure(qa_status(&e), &format!("context Q&A failed: {e}"));
      Err(qa_failure(e))
    }
  }
}

/// POST /conversational-qa/ - Answer a question and return the extended history
pub async fn conversational_qa(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  request: Result<Json<ConversationalQaRequest>, JsonRejection>,
) -> ApiResult<ConversationalQaResponse> {
  let Json(request) = request.map_err(json_failure)?;

  match state.qa.answer(&request.transcript, &request.question, &request.chat_history).await {
    Ok(answer) => {
      context.log_info(&format!("answered with {} turns of history", answer.chat_history.len()));
      Ok(Json(ConversationalQaResponse { answer: answer.answer, chat_history: answer.chat_history }))
    }
    Err(e) => {
      context.log_failure(qa_status(&e), &format!("conversational Q&A failed: {e}"));
      Err(qa_failure(e))
    }
  }
}

/// POST /conversational-qa/stream/ - Stream the answer as plain-text fragments
///
/// Failures are reported in-band as a single `[ERROR]` fragment.
pub async fn conversational_qa_stream(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  request: Result<Json<ConversationalQaRequest>, JsonRejection>,
) -> Response {
  let fragments = match request {
    Ok(Json(request)) => {
      match state.qa.answer_stream(&request.transcript, &request.question, &request.chat_history).await {
        Ok(fragments) => fragments,
        Err(e) => {
          context.log_failure(qa_status(&e), &format!("streaming Q&A failed before the first fragment: {e}"));
          streaming::error_stream(e)
        }
      }
    }
    Err(rejection) => streaming::error_stream(rejection.body_text()),
  };

  text_stream(fragments)
}

fn text_stream(fragments: FragmentStream) -> Response {
  (
    StatusCode::OK,
    [(header::CONTENT_TYPE, "text/plain; charset=utf-8"), (header::CACHE_CONTROL, "no-cache")],
    Body::from_stream(fragments.map(Ok::<_, Infallible>)),
  )
    .into_response()
}
