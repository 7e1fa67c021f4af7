//! Error envelope shared by both services.
//!
//! Every failure is answered with status 400 and `{ "error": <message>, "code": <code> }`.
//! Messages are short and never include credentials or upstream payloads.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::gemini::GenerationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  InvalidRequest(String),

  #[error("{0}")]
  Configuration(String),

  #[error("{0}")]
  Upstream(String),

  #[error("Invalid response format: {0}")]
  InvalidResponseFormat(String),

  #[error("{0}")]
  Persistence(String),
}

impl ApiError {
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::InvalidRequest(_) => "invalid_request",
      ApiError::Configuration(_) => "configuration_error",
      ApiError::Upstream(_) => "upstream_error",
      ApiError::InvalidResponseFormat(_) => "invalid_response_format",
      ApiError::Persistence(_) => "persistence_error",
    }
  }
}

impl From<GenerationError> for ApiError {
  fn from(err: GenerationError) -> Self {
    match err {
      GenerationError::MissingCredential => ApiError::Configuration(err.to_string()),
      other => ApiError::Upstream(other.to_string()),
    }
  }
}

impl From<StoreError> for ApiError {
  fn from(err: StoreError) -> Self {
    ApiError::Persistence(err.to_string())
  }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: String,
  pub code: &'static str,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let code = self.code();
    let error = self.to_string();
    warn!(target: "codementor", %code, %error, "Request failed");
    (StatusCode::BAD_REQUEST, Json(ErrorOut { error, code })).into_response()
  }
}
