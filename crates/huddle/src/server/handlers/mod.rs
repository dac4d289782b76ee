pub mod qa;
pub mod respond;
pub mod status;
pub mod upload;

use axum::extract::rejection::JsonRejection;

use crate::server::types::{failure, ApiFailure};

/// Report a malformed JSON body with the usual `{error}` shape
pub(crate) fn json_failure(rejection: JsonRejection) -> ApiFailure {
  failure(rejection.status(), rejection.body_text())
}
