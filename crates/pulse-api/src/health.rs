//! Handler for `GET /health`.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pulse_core::store::TradeStore;
use pulse_ingest::FeedSource;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
  pub status: String,
  pub db:     String,
}

/// `GET /health`: 200 when the store answers, 500 otherwise.
pub async fn handler<S, F>(State(state): State<AppState<S, F>>) -> Response
where
  S: TradeStore,
  F: FeedSource,
{
  match state.engine.store().ping().await {
    Ok(()) => Json(Health { status: "ok".into(), db: "ok".into() }).into_response(),
    Err(e) => {
      warn!(error = %e, "store ping failed");
      let body = Health { status: "error".into(), db: "error".into() };
      (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
  }
}
