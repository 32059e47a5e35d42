//! Error types for `pulse-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed period key: {0:?}")]
  MalformedPeriodKey(String),

  #[error("source format error: {0}")]
  SourceFormat(String),

  #[error("ingestion failed: {0}")]
  IngestionFailed(String),

  #[error("an ingestion run is already in progress")]
  IngestionInProgress,

  #[error("unknown metric: {0:?}")]
  UnknownMetric(String),

  #[error("no data for category {category:?} ({scope})")]
  NoData { category: String, scope: String },

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Stable, machine-readable name of the error kind. Part of the API
  /// contract; never reword these.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::MalformedPeriodKey(_) => "malformed_period_key",
      Self::SourceFormat(_) => "source_format_error",
      Self::IngestionFailed(_) => "ingestion_failed",
      Self::IngestionInProgress => "ingestion_in_progress",
      Self::UnknownMetric(_) => "unknown_metric",
      Self::NoData { .. } => "no_data",
      Self::InvalidQuery(_) => "invalid_query",
      Self::Store(_) => "store_error",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
