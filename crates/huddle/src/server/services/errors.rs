//! Failures reported by the external model services

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
  #[error("request to model service failed: {message}")]
  Transport { message: String },

  #[error("model service rejected credentials ({status}): {body}")]
  Unauthorized { status: u16, body: String },

  #[error("model service rate limit exceeded: {body}")]
  RateLimited { body: String },

  #[error("model service returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("malformed model service response: {message}")]
  Malformed { message: String },
}

impl ServiceError {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport { message: message.into() }
  }

  pub fn malformed(message: impl Into<String>) -> Self {
    Self::Malformed { message: message.into() }
  }

  /// Classify a non-success HTTP status
  pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
    let body = body.into();
    match status {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        Self::Unauthorized { status: status.as_u16(), body }
      }
      StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { body },
      _ => Self::Status { status: status.as_u16(), body },
    }
  }
}

/// Client-side failures are transport faults; undecodable bodies are
/// reported as Malformed by the parsers, which see the text first.
impl From<reqwest::Error> for ServiceError {
  fn from(err: reqwest::Error) -> Self {
    Self::transport(err.to_string())
  }
}
