//! Error types for the access server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("invalid key")]
  InvalidKey,

  #[error("device or key blocked")]
  Blocked,

  #[error("device limit reached")]
  DeviceLimitReached,

  #[error("missing required field: {0}")]
  InvalidInput(&'static str),

  #[error("persistence failure: {0}")]
  Persistence(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    Self::Persistence(err)
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      AppError::InvalidKey => (StatusCode::BAD_REQUEST, "Invalid key"),
      AppError::Blocked => (StatusCode::FORBIDDEN, "Blocked"),
      AppError::DeviceLimitReached => {
        (StatusCode::FORBIDDEN, "Device limit reached")
      }
      AppError::InvalidInput(_) => {
        (StatusCode::BAD_REQUEST, "Missing required field")
      }
      AppError::Persistence(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "Persistence failure")
      }
    };

    let body = json::json!({
      "success": false,
      "error": message,
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type AppResult<T> = Result<T, AppError>;
