//! Smart reply handler

use axum::extract::{rejection::JsonRejection, Extension, Json, State};

use crate::server::handlers::json_failure;
use crate::server::middleware::RequestContext;
use crate::server::state::AppState;
use crate::server::types::{qa_failure, qa_status, ApiResult, SmartRespondRequest, SmartRespondResponse};

/// POST /smart-respond/ - Reply to the meeting in the requested persona
pub async fn smart_respond(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  request: Result<Json<SmartRespondRequest>, JsonRejection>,
) -> ApiResult<SmartRespondResponse> {
  let Json(request) = request.map_err(json_failure)?;

  state
    .qa
    .smart_respond(&request.transcript, request.role.as_deref())
    .await
    .map(|response| Json(SmartRespondResponse { response }))
    .map_err(|e| {
      context.log_failure(qa_status(&e), &format!("smart reply failed: {e}"));
      qa_failure(e)
    })
}
