//! Record types: the raw feed row and the normalized fact.
//!
//! A [`RawRecord`] mirrors one wide row of the source CSV. A [`Fact`] is one
//! long-form `(period_date, category_code, metric)` observation derived from
//! it. Facts carry no identity beyond their key and are regenerated whenever
//! their raw row changes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::Metric;

// ─── Metric values ───────────────────────────────────────────────────────────

/// The five nullable metric columns of a raw row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
  pub nominal:          Option<f64>,
  pub real:             Option<f64>,
  pub employment:       Option<f64>,
  pub nominal_adjusted: Option<f64>,
  pub real_adjusted:    Option<f64>,
}

impl MetricValues {
  pub fn get(&self, metric: Metric) -> Option<f64> {
    match metric {
      Metric::Nominal => self.nominal,
      Metric::Real => self.real,
      Metric::Employment => self.employment,
      Metric::NominalAdjusted => self.nominal_adjusted,
      Metric::RealAdjusted => self.real_adjusted,
    }
  }

  pub fn set(&mut self, metric: Metric, value: Option<f64>) {
    let slot = match metric {
      Metric::Nominal => &mut self.nominal,
      Metric::Real => &mut self.real,
      Metric::Employment => &mut self.employment,
      Metric::NominalAdjusted => &mut self.nominal_adjusted,
      Metric::RealAdjusted => &mut self.real_adjusted,
    };
    *slot = value;
  }

  /// Non-null values in column order.
  pub fn present(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
    Metric::all().filter_map(|m| self.get(m).map(|v| (m, v)))
  }

  pub fn present_count(&self) -> usize { self.present().count() }
}

// ─── RawRecord ───────────────────────────────────────────────────────────────

/// One source row, keyed by `(period_key, category_key)`.
///
/// Upserting the same key overwrites every metric field and the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
  /// Source-encoded reporting month, e.g. `TIIDX-202101`.
  pub period_key:   String,
  /// Source-encoded classification, e.g. `NACEIDX-G47`.
  pub category_key: String,
  pub values:       MetricValues,
  pub ingested_at:  DateTime<Utc>,
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// One normalized observation, keyed by `(period_date, category_code,
/// metric)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
  /// First day of the reporting month.
  pub period_date:   NaiveDate,
  /// Classification code with the namespace prefix stripped.
  pub category_code: String,
  pub metric:        Metric,
  pub value:         f64,
  pub ingested_at:   DateTime<Utc>,
}

/// The output of normalizing one [`RawRecord`]: the mart slot it owns and
/// the facts that currently fill it.
///
/// Writing a normalized record replaces every fact in the slot, so a metric
/// that turned null upstream disappears from the mart.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
  pub period_date:   NaiveDate,
  pub category_code: String,
  pub facts:         Vec<Fact>,
}
