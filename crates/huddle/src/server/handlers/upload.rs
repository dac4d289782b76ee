//! Context document upload handler

use axum::{
  extract::{multipart::MultipartRejection, Extension, Json, Multipart},
  http::StatusCode,
};

use crate::server::middleware::RequestContext;
use crate::server::services::extract::extract_text_blocking;
use crate::server::types::{extract_failure, failure, ApiResult, UploadResponse};

/// Multipart field carrying the document
pub const FILE_FIELD: &str = "file";

/// POST /upload-context/ - Extract plain text from a .pdf, .txt or .docx upload
pub async fn upload_context(
  Extension(context): Extension<RequestContext>,
  multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResponse> {
  let mut multipart = multipart.map_err(|e| failure(e.status(), e.body_text()))?;

  let (filename, bytes) = loop {
    let field = multipart
      .next_field()
      .await
      .map_err(|e| failure(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}")))?;

    let Some(field) = field else {
      return Err(failure(
        StatusCode::BAD_REQUEST,
        format!("No file uploaded. Expected a multipart field named '{FILE_FIELD}'."),
      ));
    };
    if field.name() != Some(FILE_FIELD) {
      continue;
    }

    let filename = field.file_name().unwrap_or_default().to_string();
    let bytes = field
      .bytes()
      .await
      .map_err(|e| failure(StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}")))?;
    break (filename, bytes);
  };

  context.log_info(&format!("extracting text from {filename} ({} bytes)", bytes.len()));

  match extract_text_blocking(filename, bytes).await {
    Ok(context_text) => Ok(Json(UploadResponse { context_text })),
    Err(e) => {
      let (status, body) = extract_failure(e);
      context.log_failure(status, &body.error);
      Err((status, body))
    }
  }
}
