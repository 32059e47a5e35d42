//! The `TradeStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `pulse-store-sqlite`).
//! Higher layers (`pulse-ingest`, `pulse-api`) depend on this abstraction,
//! not on any concrete backend.

use std::{collections::HashMap, future::Future};

use chrono::NaiveDate;

use crate::{
  metric::Metric,
  record::{Fact, NormalizedRecord, RawRecord},
};

// ─── Write batch ─────────────────────────────────────────────────────────────

/// Everything one ingestion run writes, applied as a single unit.
#[derive(Debug, Clone, Default)]
pub struct IngestBatch {
  pub raw:        Vec<RawRecord>,
  /// One entry per raw record whose period key decoded.
  pub normalized: Vec<NormalizedRecord>,
}

impl IngestBatch {
  /// Facts the mart holds for this batch once applied. A later record for
  /// the same `(period_date, category_code)` slot replaces an earlier one.
  pub fn fact_count(&self) -> usize {
    let mut slots: HashMap<(NaiveDate, &str), usize> = HashMap::new();
    for n in &self.normalized {
      slots.insert((n.period_date, n.category_code.as_str()), n.facts.len());
    }
    slots.values().sum()
  }
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`TradeStore::series`]. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
  pub category_code: String,
  pub metric:        Metric,
  pub start:         Option<NaiveDate>,
  pub end:           Option<NaiveDate>,
  pub limit:         Option<usize>,
}

impl SeriesQuery {
  pub fn new(category_code: impl Into<String>, metric: Metric) -> Self {
    Self {
      category_code: category_code.into(),
      metric,
      start: None,
      end: None,
      limit: None,
    }
  }
}

/// Two metrics observed on the same date for the same category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoincidentPair {
  pub period_date: NaiveDate,
  pub first:       f64,
  pub second:      f64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the raw + mart store backend.
///
/// Upsert (insert-or-replace by primary key) is the only mutation besides a
/// full reset. Every write method is atomic with respect to readers: a reader
/// never observes a half-applied call.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TradeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert every raw record and replace the mart slot of every normalized
  /// record, all in one transaction.
  fn apply_batch(
    &self,
    batch: IngestBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert raw records only.
  fn upsert_raw(
    &self,
    records: Vec<RawRecord>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert individual facts only.
  fn upsert_facts(
    &self,
    facts: Vec<Fact>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Atomically swap the whole mart for `facts`.
  fn replace_mart(
    &self,
    facts: Vec<Fact>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Empty both tables.
  fn reset(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Full reads ────────────────────────────────────────────────────────

  /// All raw records ordered by `(period_key, category_key)`.
  fn list_raw(
    &self,
  ) -> impl Future<Output = Result<Vec<RawRecord>, Self::Error>> + Send + '_;

  /// All facts ordered by primary key.
  fn all_facts(
    &self,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  /// The mart as the backend's own declarative normalization would compute it
  /// from the raw table. Read-only; used to cross-check [`crate::normalize`].
  fn normalize_in_store(
    &self,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + '_;

  /// Distinct metric names as stored, without parsing them.
  fn metric_names(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Queries ───────────────────────────────────────────────────────────

  /// Distinct category codes, ascending.
  fn list_categories(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Facts matching `query`, ascending by date, truncated to its limit.
  fn series<'a>(
    &'a self,
    query: &'a SeriesQuery,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + 'a;

  /// Up to `n` facts for the key, newest first.
  fn latest_facts<'a>(
    &'a self,
    category_code: &'a str,
    metric: Metric,
    n: usize,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + 'a;

  /// The newest date on which both metrics have a fact for the category.
  fn latest_coincident<'a>(
    &'a self,
    category_code: &'a str,
    first: Metric,
    second: Metric,
  ) -> impl Future<Output = Result<Option<CoincidentPair>, Self::Error>> + Send + 'a;

  /// Cheap connectivity probe.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
