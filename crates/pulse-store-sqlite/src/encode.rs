//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as
//! `YYYY-MM-DD` (so lexical order is date order), metrics by name.

use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{
  Metric,
  record::{Fact, MetricValues, RawRecord},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// A `raw_trade` row ready to bind, or as read back.
pub struct RawTradeRow {
  pub period_key:   String,
  pub category_key: String,
  /// In `Metric::all()` order.
  pub values:       [Option<f64>; 5],
  pub ingested_at:  String,
}

impl RawTradeRow {
  pub fn encode(r: &RawRecord) -> Self {
    let mut values = [None; 5];
    for (slot, metric) in values.iter_mut().zip(Metric::all()) {
      *slot = r.values.get(metric);
    }
    Self {
      period_key: r.period_key.clone(),
      category_key: r.category_key.clone(),
      values,
      ingested_at: encode_dt(r.ingested_at),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_key:   row.get(0)?,
      category_key: row.get(1)?,
      values:       [row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
      ingested_at:  row.get(7)?,
    })
  }

  pub fn into_record(self) -> Result<RawRecord> {
    let mut values = MetricValues::default();
    for (value, metric) in self.values.into_iter().zip(Metric::all()) {
      values.set(metric, value);
    }
    Ok(RawRecord {
      period_key: self.period_key,
      category_key: self.category_key,
      values,
      ingested_at: decode_dt(&self.ingested_at)?,
    })
  }
}

/// A `trade_index` row ready to bind, or as read back.
pub struct FactRow {
  pub period_date:   String,
  pub category_code: String,
  pub metric:        String,
  pub value:         f64,
  pub ingested_at:   String,
}

impl FactRow {
  pub fn encode(f: &Fact) -> Self {
    Self {
      period_date:   encode_date(f.period_date),
      category_code: f.category_code.clone(),
      metric:        f.metric.as_str().to_owned(),
      value:         f.value,
      ingested_at:   encode_dt(f.ingested_at),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_date:   row.get(0)?,
      category_code: row.get(1)?,
      metric:        row.get(2)?,
      value:         row.get(3)?,
      ingested_at:   row.get(4)?,
    })
  }

  pub fn into_fact(self) -> Result<Fact> {
    Ok(Fact {
      period_date:   decode_date(&self.period_date)?,
      category_code: self.category_code,
      metric:        Metric::from_name(&self.metric)?,
      value:         self.value,
      ingested_at:   decode_dt(&self.ingested_at)?,
    })
  }
}
