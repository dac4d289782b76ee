//! Request context and middleware for the huddle REST API
//!
//! Every request gets a [`RequestContext`] in its extensions carrying a
//! unique id, so handler logs can be correlated with the access log lines.

use std::time::Instant;

use axum::{
  extract::Request,
  http::{HeaderName, HeaderValue, Method, StatusCode, Uri},
  middleware::Next,
  response::Response,
};
use uuid::Uuid;

/// Response header echoing the request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request metadata injected by [`request_context_middleware`]
#[derive(Debug, Clone)]
pub struct RequestContext {
  /// Unique ID for this request
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri) -> Self {
    Self { request_id: Uuid::new_v4(), method, uri }
  }

  pub fn log_info(&self, message: &str) {
    tracing::info!(request_id = %self.request_id, "{} {} - {message}", self.method, self.uri.path());
  }

  /// Log a failed request, at error level when the fault is ours
  pub fn log_failure(&self, status: StatusCode, message: &str) {
    if status.is_server_error() {
      self.log_error(message);
    } else {
      self.log_warn(message);
    }
  }

  fn log_warn(&self, message: &str) {
    tracing::warn!(request_id = %self.request_id, "{} {} - {message}", self.method, self.uri.path());
  }

  fn log_error(&self, message: &str) {
    tracing::error!(request_id = %self.request_id, "{} {} - {message}", self.method, self.uri.path());
  }

  fn log_request_start(&self) {
    tracing::debug!(request_id = %self.request_id, "{} {} - request started", self.method, self.uri.path());
  }

  fn log_request_complete(&self, status: u16, duration_ms: f64) {
    tracing::info!(
      request_id = %self.request_id,
      status,
      "{} {} - request completed in {duration_ms:.2}ms",
      self.method,
      self.uri.path()
    );
  }
}

/// Middleware to inject RequestContext into all requests
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
  let context = RequestContext::new(request.method().clone(), request.uri().clone());

  let start_time = Instant::now();
  context.log_request_start();

  request.extensions_mut().insert(context.clone());
  let mut response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  context.log_request_complete(response.status().as_u16(), duration_ms);

  if let Ok(value) = HeaderValue::from_str(&context.request_id.to_string()) {
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
  }
  response
}
