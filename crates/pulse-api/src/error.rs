//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::QueryRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
///
/// Rendered as `{"error": <kind>, "message": <text>}` where `kind` is the
/// stable [`pulse_core::Error::kind`] string.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] pulse_core::Error),

  /// The query string did not deserialise (missing field, bad number, ...).
  #[error("invalid query string: {0}")]
  Query(#[from] QueryRejection),
}

impl ApiError {
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::Core(e) => e.kind(),
      ApiError::Query(_) => "invalid_query",
    }
  }

  pub fn status(&self) -> StatusCode {
    use pulse_core::Error as E;
    match self {
      ApiError::Core(e) => match e {
        E::MalformedPeriodKey(_) | E::SourceFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        E::IngestionFailed(_) => StatusCode::BAD_GATEWAY,
        E::IngestionInProgress => StatusCode::CONFLICT,
        E::UnknownMetric(_) | E::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        E::NoData { .. } => StatusCode::NOT_FOUND,
        E::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Query(_) => StatusCode::BAD_REQUEST,
    }
  }

  pub(crate) fn invalid(message: impl Into<String>) -> Self {
    pulse_core::Error::InvalidQuery(message.into()).into()
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(kind = self.kind(), error = %self, "request failed");
    }
    let body = json!({ "error": self.kind(), "message": self.to_string() });
    (status, Json(body)).into_response()
  }
}
