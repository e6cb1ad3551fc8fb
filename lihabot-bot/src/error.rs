use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use lihabot_core::QueueError;
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }

  pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: Some(details.into()),
    }
  }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
  Queue(QueueError),
  PlayerNotQueued,
}

/// HTTP status for a domain failure.
pub fn status_for(err: &QueueError) -> StatusCode {
  match err {
    QueueError::NotFound(_) | QueueError::QueueNotFound(_) | QueueError::NotQueued(_) => {
      StatusCode::NOT_FOUND
    }
    QueueError::NotOwner | QueueError::NotAuthorized => StatusCode::FORBIDDEN,
    QueueError::DuplicateKey { .. }
    | QueueError::DuplicateOwner { .. }
    | QueueError::AlreadyQueued { .. }
    | QueueError::AlreadyQueuedElsewhere { .. }
    | QueueError::QueueEmpty(_) => StatusCode::CONFLICT,
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::Queue(err) => {
        tracing::debug!(error = %err, "request rejected");
        let status = status_for(&err);
        let error = match status {
          StatusCode::NOT_FOUND => "Not found",
          StatusCode::FORBIDDEN => "Not allowed",
          _ => "Conflict",
        };
        let error_response = ErrorResponse::with_details(error, err.to_string());
        (status, Json(error_response)).into_response()
      }
      AppError::PlayerNotQueued => {
        let error_response = ErrorResponse::new("Player is not in any queue");
        (StatusCode::NOT_FOUND, Json(error_response)).into_response()
      }
    }
  }
}

impl From<QueueError> for AppError {
  fn from(err: QueueError) -> Self {
    AppError::Queue(err)
  }
}
