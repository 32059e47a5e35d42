//! Error types for the feed codec.

use thiserror::Error;

/// A failure that makes the whole source unusable. Row-level problems are
/// reported through [`pulse_core::ingest::RowError`] instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("missing required columns: {missing}; headers detected: {headers}")]
  MissingColumns { missing: String, headers: String },

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),
}

impl From<Error> for pulse_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::MissingColumns { .. } => Self::SourceFormat(e.to_string()),
      Error::Csv(_) => Self::IngestionFailed(e.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
