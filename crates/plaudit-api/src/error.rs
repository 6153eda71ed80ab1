//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use plaudit_core::{AutoPublishError, BoxError, RerunError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The workflow service failed; the message is passed through unchanged.
  #[error("upstream error: {0}")]
  Upstream(String),

  /// Logged in full; clients only see a generic message.
  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<RerunError> for ApiError {
  fn from(e: RerunError) -> Self {
    match e {
      RerunError::TestimonialNotFound(_) | RerunError::ResponseNotFound(_) => {
        Self::NotFound(e.to_string())
      }
      RerunError::Upstream(message) => Self::Upstream(message),
      RerunError::Persistence(source) => Self::Store(source),
    }
  }
}

impl From<AutoPublishError> for ApiError {
  fn from(e: AutoPublishError) -> Self { Self::store(e) }
}

impl From<JsonRejection> for ApiError {
  fn from(_: JsonRejection) -> Self { Self::BadRequest("invalid payload".to_owned()) }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Upstream(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure while handling request");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
