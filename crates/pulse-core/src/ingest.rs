//! Ingestion vocabulary shared by the feed parser, the pipeline, and the API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Where an ingestion run reads its rows from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IngestMode {
  /// The small bundled fixture; used for smoke tests.
  #[default]
  Mock,
  /// The full upstream feed.
  Live,
}

/// A problem confined to a single source row. Counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
  /// 1-based line number in the source, header included.
  pub line:    usize,
  /// [`Error::kind`] of the underlying failure.
  pub kind:    String,
  pub message: String,
}

impl RowError {
  pub fn new(line: usize, error: &Error) -> Self {
    Self {
      line,
      kind: error.kind().to_owned(),
      message: error.to_string(),
    }
  }
}

/// Summary returned by a completed ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
  /// Rows that became raw records.
  pub rows_loaded:         usize,
  pub distinct_categories: usize,
  /// Earliest decodable period in the run; `None` for an empty source.
  pub min_date:            Option<NaiveDate>,
  pub max_date:            Option<NaiveDate>,
  pub mode:                IngestMode,
  /// Facts written to the mart by this run.
  pub facts_written:       usize,
  /// Rows that produced no facts because of a row-level error.
  pub rows_rejected:       usize,
  pub row_errors:          Vec<RowError>,
  /// `F-` columns in the header that map to no known metric. Their values
  /// are never stored.
  pub ignored_columns:     Vec<String>,
}
