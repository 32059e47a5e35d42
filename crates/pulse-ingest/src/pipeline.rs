//! One ingestion run: fetch → parse → normalize → one transactional write.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use pulse_core::{
  Error, Result,
  ingest::{IngestMode, IngestStats, RowError},
  materialize::{self, MaterializeReport, Strategy},
  normalize::{decode_category_key, normalize},
  store::{IngestBatch, TradeStore},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::source::FeedSource;

/// Drives ingestion runs against a store.
///
/// At most one run (ingestion or mart rebuild) is in flight per pipeline; a
/// second caller is turned away with [`Error::IngestionInProgress`] rather
/// than queued.
pub struct Pipeline<S, F> {
  store:  Arc<S>,
  source: F,
  lock:   Mutex<()>,
}

impl<S: TradeStore, F: FeedSource> Pipeline<S, F> {
  pub fn new(store: Arc<S>, source: F) -> Self {
    Self { store, source, lock: Mutex::new(()) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Fetch, parse, normalize, and upsert one feed document.
  ///
  /// Nothing is written unless the source was fetched and its header
  /// understood. Row-level problems never abort the run; they are reported in
  /// [`IngestStats::row_errors`].
  pub async fn ingest(&self, mode: IngestMode) -> Result<IngestStats> {
    let _guard = self.lock.try_lock().map_err(|_| Error::IngestionInProgress)?;

    let text = self.source.fetch(mode).await?;

    let ingested_at = Utc::now();
    let feed = pulse_feed::parse_feed(&text, ingested_at).map_err(Error::from)?;

    // Every accepted row counts, including those whose period key will not
    // decode; they still land in the raw table.
    let categories: BTreeSet<String> = feed
      .records
      .iter()
      .map(|r| decode_category_key(&r.category_key))
      .collect();
    let distinct_categories = categories.len();

    let mut row_errors = feed.row_errors;
    let mut normalized = Vec::with_capacity(feed.records.len());
    for (raw, line) in feed.records.iter().zip(&feed.lines) {
      match normalize(raw) {
        Ok(n) => normalized.push(n),
        Err(e) => {
          warn!(line, error = %e, "raw row kept without facts");
          row_errors.push(RowError::new(*line, &e));
        }
      }
    }
    row_errors.sort_by_key(|e| e.line);

    let min_date = normalized.iter().map(|n| n.period_date).min();
    let max_date = normalized.iter().map(|n| n.period_date).max();

    let rows_loaded = feed.records.len();
    let ignored_columns = feed.ignored_columns;
    let batch = IngestBatch { raw: feed.records, normalized };
    let facts_written = batch.fact_count();

    if rows_loaded > 0 {
      self
        .store
        .apply_batch(batch)
        .await
        .map_err(|e| Error::IngestionFailed(format!("store write failed: {e}")))?;
    }

    let stats = IngestStats {
      rows_loaded,
      distinct_categories,
      min_date,
      max_date,
      mode,
      facts_written,
      rows_rejected: row_errors.len(),
      row_errors,
      ignored_columns,
    };

    info!(
      %mode,
      rows_loaded = stats.rows_loaded,
      facts_written = stats.facts_written,
      rows_rejected = stats.rows_rejected,
      categories = stats.distinct_categories,
      "ingestion complete"
    );
    Ok(stats)
  }

  /// Rebuild the whole mart from the raw table under the same lock as
  /// [`Self::ingest`], so a rebuild never interleaves with a batch write.
  pub async fn materialize(&self, strategy: Strategy) -> Result<MaterializeReport> {
    let _guard = self.lock.try_lock().map_err(|_| Error::IngestionInProgress)?;
    materialize::rebuild(self.store.as_ref(), strategy).await
  }
}
