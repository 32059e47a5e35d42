//! Read-side query engine: windowed series, latest-value deltas, and the
//! nominal-vs-real insight.
//!
//! Every query is stateless and reads whatever the store last committed.
//! Metric names arrive as strings and are validated here, before the store is
//! touched.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  metric::Metric,
  record::Fact,
  store::{SeriesQuery, TradeStore},
};

/// Decimal places kept on `delta_percent`.
pub const PERCENT_PRECISION: i32 = 3;
/// Decimal places kept on absolute differences; enough to shed binary float
/// noise without touching published one-decimal index values.
pub const VALUE_PRECISION: i32 = 6;

/// Shown alongside every nominal-vs-real comparison.
pub const NOMINAL_VS_REAL_CAVEAT: &str =
  "Nominal vs. real gap is indicative; interpret with context.";

// ─── Response types ──────────────────────────────────────────────────────────

/// A single series observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
  pub period_date: NaiveDate,
  pub value:       f64,
}

impl From<Fact> for SeriesPoint {
  fn from(f: Fact) -> Self {
    Self { period_date: f.period_date, value: f.value }
  }
}

/// The newest value of a series and its change against the previous
/// available observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
  pub category:       String,
  pub metric:         Metric,
  pub latest_date:    NaiveDate,
  pub latest_value:   f64,
  pub previous_date:  Option<NaiveDate>,
  pub previous_value: Option<f64>,
  pub delta:          Option<f64>,
  pub delta_percent:  Option<f64>,
}

/// Nominal and real index on the newest date where both exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominalVsReal {
  pub category:      String,
  pub period_date:   NaiveDate,
  pub nominal_value: f64,
  pub real_value:    f64,
  pub gap:           f64,
  pub caveat:        String,
}

// ─── Pure derivations ────────────────────────────────────────────────────────

pub fn round_to(value: f64, places: i32) -> f64 {
  let factor = 10f64.powi(places);
  (value * factor).round() / factor
}

/// Build a [`LatestValue`] from facts ordered newest first.
///
/// Only the first two entries are considered; the second is whatever the most
/// recent earlier observation is, not necessarily the previous month.
pub fn derive_latest(
  category: &str,
  metric: Metric,
  newest_first: &[Fact],
) -> Result<LatestValue> {
  let latest = newest_first.first().ok_or_else(|| Error::NoData {
    category: category.to_owned(),
    scope:    format!("metric {metric}"),
  })?;
  let previous = newest_first.get(1);

  let delta = previous.map(|p| latest.value - p.value);
  let delta_percent = match (delta, previous) {
    (Some(d), Some(p)) if p.value != 0.0 => {
      Some(round_to(d / p.value * 100.0, PERCENT_PRECISION))
    }
    _ => None,
  };

  Ok(LatestValue {
    category: category.to_owned(),
    metric,
    latest_date: latest.period_date,
    latest_value: latest.value,
    previous_date: previous.map(|p| p.period_date),
    previous_value: previous.map(|p| p.value),
    delta: delta.map(|d| round_to(d, VALUE_PRECISION)),
    delta_percent,
  })
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Query façade over any [`TradeStore`].
///
/// Cloning is cheap; the store is reference-counted.
pub struct QueryEngine<S> {
  store: Arc<S>,
}

impl<S> Clone for QueryEngine<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TradeStore> QueryEngine<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Distinct category codes, lexicographic.
  pub async fn list_categories(&self) -> Result<Vec<String>> {
    self.store.list_categories().await.map_err(Error::store)
  }

  /// Observations for one category and metric, oldest first.
  ///
  /// An empty window is a valid answer, not an error.
  pub async fn series(
    &self,
    category: &str,
    metric: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    limit: Option<usize>,
  ) -> Result<Vec<SeriesPoint>> {
    let metric = Metric::from_name(metric)?;
    let query = SeriesQuery {
      category_code: category.to_owned(),
      metric,
      start,
      end,
      limit,
    };
    let facts = self.store.series(&query).await.map_err(Error::store)?;
    Ok(facts.into_iter().map(SeriesPoint::from).collect())
  }

  /// Newest value plus its change against the previous available date.
  pub async fn latest(&self, category: &str, metric: &str) -> Result<LatestValue> {
    let metric = Metric::from_name(metric)?;
    let facts = self
      .store
      .latest_facts(category, metric, 2)
      .await
      .map_err(Error::store)?;
    derive_latest(category, metric, &facts)
  }

  /// Nominal vs. real index on the newest date where both are present.
  ///
  /// Taking each metric's own newest date would pair values from different
  /// months whenever one series lags the other.
  pub async fn nominal_vs_real(&self, category: &str) -> Result<NominalVsReal> {
    let pair = self
      .store
      .latest_coincident(category, Metric::Nominal, Metric::Real)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NoData {
        category: category.to_owned(),
        scope:    "no date carries both nominal and real index".to_owned(),
      })?;

    Ok(NominalVsReal {
      category:      category.to_owned(),
      period_date:   pair.period_date,
      nominal_value: pair.first,
      real_value:    pair.second,
      gap:           round_to(pair.first - pair.second, VALUE_PRECISION),
      caveat:        NOMINAL_VS_REAL_CAVEAT.to_owned(),
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  fn fact(y: i32, m: u32, value: f64) -> Fact {
    Fact {
      period_date: NaiveDate::from_ymd_opt(y, m, 1).unwrap(),
      category_code: "G47".into(),
      metric: Metric::Nominal,
      value,
      ingested_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
  }

  #[test]
  fn delta_against_nearest_earlier_date() {
    let facts = [fact(2021, 3, 97.8), fact(2021, 1, 96.1)];
    let latest = derive_latest("G47", Metric::Nominal, &facts).unwrap();

    assert_eq!(latest.latest_value, 97.8);
    assert_eq!(latest.previous_value, Some(96.1));
    assert_eq!(latest.previous_date, NaiveDate::from_ymd_opt(2021, 1, 1));
    assert_eq!(latest.delta, Some(1.7));
    assert_eq!(latest.delta_percent, Some(1.769));
  }

  #[test]
  fn single_fact_has_no_delta() {
    let latest =
      derive_latest("G47", Metric::Nominal, &[fact(2021, 2, 100.0)]).unwrap();
    assert_eq!(latest.latest_value, 100.0);
    assert!(latest.previous_value.is_none());
    assert!(latest.previous_date.is_none());
    assert!(latest.delta.is_none());
    assert!(latest.delta_percent.is_none());
  }

  #[test]
  fn zero_previous_suppresses_percent() {
    let facts = [fact(2021, 2, 5.0), fact(2021, 1, 0.0)];
    let latest = derive_latest("G47", Metric::Nominal, &facts).unwrap();
    assert_eq!(latest.delta, Some(5.0));
    assert!(latest.delta_percent.is_none());
  }

  #[test]
  fn no_facts_is_no_data() {
    let err = derive_latest("G47", Metric::Real, &[]).unwrap_err();
    assert!(matches!(err, Error::NoData { ref category, .. } if category == "G47"));
    assert_eq!(err.kind(), "no_data");
  }

  #[test]
  fn negative_delta_rounds_symmetrically() {
    let facts = [fact(2021, 2, 96.1), fact(2021, 1, 97.8)];
    let latest = derive_latest("G47", Metric::Nominal, &facts).unwrap();
    assert_eq!(latest.delta, Some(-1.7));
    assert_eq!(latest.delta_percent, Some(-1.738));
  }

  #[test]
  fn rounding() {
    assert_eq!(round_to(1.76899, 3), 1.769);
    assert_eq!(round_to(97.8 - 96.1, VALUE_PRECISION), 1.7);
  }
}
