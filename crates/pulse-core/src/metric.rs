//! The closed metric vocabulary.
//!
//! The feed publishes five index series per (period, category). Anything
//! else is a data-quality violation and is rejected wherever a metric name
//! crosses into the system.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator as _, IntoStaticStr};

use crate::{Error, Result};

/// One of the fixed index series.
///
/// The serialised name is the lowercase column stem used by the source feed
/// (`F-UIDXNOM` → `uidxnom`) and stored in the `metric` column of the mart.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  EnumIter,
  IntoStaticStr,
  strum::Display,
  strum::EnumString,
)]
pub enum Metric {
  /// Nominal turnover index.
  #[serde(rename = "uidxnom")]
  #[strum(serialize = "uidxnom")]
  Nominal,
  /// Real (price-adjusted) turnover index.
  #[serde(rename = "uidxreal")]
  #[strum(serialize = "uidxreal")]
  Real,
  /// Employment index.
  #[serde(rename = "beschidx")]
  #[strum(serialize = "beschidx")]
  Employment,
  /// Seasonally-adjusted nominal turnover index.
  #[serde(rename = "uidxnsb")]
  #[strum(serialize = "uidxnsb")]
  NominalAdjusted,
  /// Seasonally-adjusted real turnover index.
  #[serde(rename = "uidxrsb")]
  #[strum(serialize = "uidxrsb")]
  RealAdjusted,
}

impl Metric {
  /// Parse a metric name, failing closed on anything outside the vocabulary.
  pub fn from_name(name: &str) -> Result<Self> {
    name
      .parse()
      .map_err(|_| Error::UnknownMetric(name.to_owned()))
  }

  /// The name stored in the database and used on the wire.
  pub fn as_str(self) -> &'static str { self.into() }

  /// All metrics in column order.
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_roundtrip() {
    for metric in Metric::all() {
      assert_eq!(Metric::from_name(metric.as_str()).unwrap(), metric);
      assert_eq!(metric.to_string(), metric.as_str());
    }
  }

  #[test]
  fn unknown_name_is_rejected() {
    let err = Metric::from_name("uidxfoo").unwrap_err();
    assert!(matches!(err, Error::UnknownMetric(ref n) if n == "uidxfoo"));
  }

  #[test]
  fn names_are_case_sensitive() {
    assert!(Metric::from_name("UIDXNOM").is_err());
  }

  #[test]
  fn serde_uses_feed_names() {
    let json = serde_json::to_string(&Metric::NominalAdjusted).unwrap();
    assert_eq!(json, "\"uidxnsb\"");
  }
}
