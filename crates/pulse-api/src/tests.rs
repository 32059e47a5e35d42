//! Router tests: each request goes through the full axum stack with
//! `tower::ServiceExt::oneshot` against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode},
};
use pulse_ingest::{HttpSource, SourceConfig};
use pulse_store_sqlite::SqliteStore;
use serde_json::Value;
use tower::ServiceExt as _;

use crate::{AppState, api_router};

async fn app() -> Router {
  let store = Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  );
  let source = HttpSource::new(SourceConfig::default()).unwrap();
  api_router(AppState::new(store, source))
}

/// A router whose store already holds the bundled fixture.
async fn seeded() -> Router {
  let app = app().await;
  let (status, _) = send(&app, "POST", "/ingest?mode=mock").await;
  assert_eq!(status, StatusCode::OK);
  app
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .body(Body::empty())
    .unwrap();
  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, json)
}

// ─── Health / ingest ─────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_db_ok() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/health").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
  assert_eq!(body["db"], "ok");
}

#[tokio::test]
async fn mock_ingest_returns_stats() {
  let app = app().await;
  let (status, body) = send(&app, "POST", "/ingest?mode=mock").await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["rows_loaded"], 12);
  assert_eq!(body["distinct_categories"], 4);
  assert_eq!(body["min_date"], "2021-01-01");
  assert_eq!(body["max_date"], "2021-03-01");
  assert_eq!(body["mode"], "mock");
  assert_eq!(body["ignored_columns"], serde_json::json!([]));
}

#[tokio::test]
async fn ingest_defaults_to_mock() {
  let app = app().await;
  let (status, body) = send(&app, "POST", "/ingest").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["mode"], "mock");
}

#[tokio::test]
async fn unknown_ingest_mode_is_rejected() {
  let app = app().await;
  let (status, body) = send(&app, "POST", "/ingest?mode=stream").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid_query");
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn categories_are_sorted() {
  let app = seeded().await;
  let (status, body) = send(&app, "GET", "/categories").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, serde_json::json!(["G", "G45", "G46", "G47"]));
}

#[tokio::test]
async fn series_honours_window_and_limit() {
  let app = seeded().await;

  let (status, body) =
    send(&app, "GET", "/series?category=G47&metric=uidxnom&start=2021-02-01").await;
  assert_eq!(status, StatusCode::OK);
  let points = body.as_array().unwrap();
  assert_eq!(points.len(), 2);
  assert_eq!(points[0]["period_date"], "2021-02-01");
  assert_eq!(points[1]["value"], 97.8);

  let (_, body) = send(&app, "GET", "/series?nace=G47&metric=uidxnom&limit=1").await;
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["period_date"], "2021-01-01");
}

#[tokio::test]
async fn series_rejects_bad_input() {
  let app = seeded().await;

  let (status, body) = send(&app, "GET", "/series?category=G47&metric=turnover").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "unknown_metric");

  let (status, body) =
    send(&app, "GET", "/series?category=G47&metric=uidxnom&start=2021-13-01").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid_query");

  let (status, body) =
    send(&app, "GET", "/series?category=G47&metric=uidxnom&limit=5001").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid_query");

  let (status, body) = send(&app, "GET", "/series?metric=uidxnom").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid_query");
}

#[tokio::test]
async fn unknown_metric_on_empty_store_is_still_rejected() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/series?category=G47&metric=bogus").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "unknown_metric");
}

#[tokio::test]
async fn latest_reports_delta() {
  let app = seeded().await;
  let (status, body) = send(&app, "GET", "/latest?category=G47&metric=uidxnom").await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["latest_date"], "2021-03-01");
  assert_eq!(body["latest_value"], 97.8);
  assert_eq!(body["previous_value"], 97.0);
  assert_eq!(body["delta"], 0.8);
  assert_eq!(body["delta_percent"], 0.825);
}

#[tokio::test]
async fn latest_without_data_is_404() {
  let app = seeded().await;
  let (status, body) = send(&app, "GET", "/latest?category=G99&metric=uidxnom").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "no_data");
  assert!(body["message"].as_str().unwrap().contains("G99"));
}

#[tokio::test]
async fn nominal_vs_real_pairs_the_coincident_month() {
  let app = seeded().await;

  // G45 has no real index for 2021-03.
  let (status, body) =
    send(&app, "GET", "/insights/nominal-vs-real?category=G45").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["period_date"], "2021-02-01");
  assert_eq!(body["nominal_value"], 91.5);
  assert_eq!(body["real_value"], 89.8);
  assert_eq!(body["gap"], 1.7);
  assert!(body["caveat"].as_str().is_some());
}

// ─── Materialization ─────────────────────────────────────────────────────────

#[tokio::test]
async fn materialize_then_verify_is_consistent() {
  let app = seeded().await;

  let (status, report) = send(&app, "POST", "/materialize?strategy=sql").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["strategy"], "sql");
  assert_eq!(report["raw_rows"], 12);
  assert_eq!(report["facts_written"], 58);

  let (status, verify) = send(&app, "GET", "/materialize/verify").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(verify["consistent"], true);
  assert_eq!(verify["mart_fingerprint"], report["fingerprint"]);
}
