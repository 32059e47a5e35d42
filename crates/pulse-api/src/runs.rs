//! Endpoints that write: ingestion and mart rebuilds, plus the read-only
//! consistency check.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/ingest` | `?mode=mock\|live`, default `mock`; 409 while a run is in flight |
//! | `POST` | `/materialize` | `?strategy=native\|sql`, default `native` |
//! | `GET`  | `/materialize/verify` | Never writes |

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use pulse_core::{
  ingest::{IngestMode, IngestStats},
  materialize::{self, MaterializeReport, Strategy, VerifyReport},
  store::TradeStore,
};
use pulse_ingest::FeedSource;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct IngestParams {
  #[serde(default)]
  pub mode: IngestMode,
}

/// `POST /ingest[?mode=mock|live]`
pub async fn ingest<S, F>(
  State(state): State<AppState<S, F>>,
  params: Result<Query<IngestParams>, QueryRejection>,
) -> Result<Json<IngestStats>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  let Query(params) = params?;
  Ok(Json(state.pipeline.ingest(params.mode).await?))
}

#[derive(Debug, Deserialize)]
pub struct MaterializeParams {
  #[serde(default)]
  pub strategy: Strategy,
}

/// `POST /materialize[?strategy=native|sql]`
pub async fn rebuild<S, F>(
  State(state): State<AppState<S, F>>,
  params: Result<Query<MaterializeParams>, QueryRejection>,
) -> Result<Json<MaterializeReport>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  let Query(params) = params?;
  Ok(Json(state.pipeline.materialize(params.strategy).await?))
}

/// `GET /materialize/verify`
pub async fn verify<S, F>(
  State(state): State<AppState<S, F>>,
) -> Result<Json<VerifyReport>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  Ok(Json(materialize::verify(state.engine.store().as_ref()).await?))
}
