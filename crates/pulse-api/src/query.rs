//! Read-only analytics endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/categories` | Sorted category codes |
//! | `GET`  | `/series` | `?category&metric[&start][&end][&limit]` |
//! | `GET`  | `/latest` | `?category&metric`; 404 when the series is empty |
//! | `GET`  | `/insights/nominal-vs-real` | `?category` |
//!
//! `category` is also accepted as `nace`.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use chrono::NaiveDate;
use pulse_core::{
  query::{LatestValue, NominalVsReal, SeriesPoint},
  store::TradeStore,
};
use pulse_ingest::FeedSource;
use serde::Deserialize;

use crate::{AppState, error::ApiError};

pub const DEFAULT_SERIES_LIMIT: usize = 500;
pub const MAX_SERIES_LIMIT: usize = 5000;

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
  value
    .map(|v| {
      NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
        ApiError::invalid(format!("{field} must be YYYY-MM-DD, got {v:?}"))
      })
    })
    .transpose()
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /categories`
pub async fn categories<S, F>(
  State(state): State<AppState<S, F>>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  Ok(Json(state.engine.list_categories().await?))
}

// ─── Series ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
  #[serde(alias = "nace")]
  pub category: String,
  pub metric:   String,
  /// Inclusive, `YYYY-MM-DD`.
  pub start:    Option<String>,
  /// Inclusive, `YYYY-MM-DD`.
  pub end:      Option<String>,
  pub limit:    Option<usize>,
}

/// `GET /series?category=<code>&metric=<name>[&start=...][&end=...][&limit=...]`
pub async fn series<S, F>(
  State(state): State<AppState<S, F>>,
  params: Result<Query<SeriesParams>, QueryRejection>,
) -> Result<Json<Vec<SeriesPoint>>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  let Query(params) = params?;

  let limit = params.limit.unwrap_or(DEFAULT_SERIES_LIMIT);
  if !(1..=MAX_SERIES_LIMIT).contains(&limit) {
    return Err(ApiError::invalid(format!(
      "limit must be between 1 and {MAX_SERIES_LIMIT}, got {limit}"
    )));
  }
  let start = parse_date("start", params.start.as_deref())?;
  let end = parse_date("end", params.end.as_deref())?;

  let points = state
    .engine
    .series(&params.category, &params.metric, start, end, Some(limit))
    .await?;
  Ok(Json(points))
}

// ─── Latest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LatestParams {
  #[serde(alias = "nace")]
  pub category: String,
  pub metric:   String,
}

/// `GET /latest?category=<code>&metric=<name>`
pub async fn latest<S, F>(
  State(state): State<AppState<S, F>>,
  params: Result<Query<LatestParams>, QueryRejection>,
) -> Result<Json<LatestValue>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  let Query(params) = params?;
  Ok(Json(state.engine.latest(&params.category, &params.metric).await?))
}

// ─── Insights ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CategoryParams {
  #[serde(alias = "nace")]
  pub category: String,
}

/// `GET /insights/nominal-vs-real?category=<code>`
pub async fn nominal_vs_real<S, F>(
  State(state): State<AppState<S, F>>,
  params: Result<Query<CategoryParams>, QueryRejection>,
) -> Result<Json<NominalVsReal>, ApiError>
where
  S: TradeStore,
  F: FeedSource,
{
  let Query(params) = params?;
  Ok(Json(state.engine.nominal_vs_real(&params.category).await?))
}
