//! Batch recomputation of the mart from the raw table, plus a consistency
//! check between the stored mart, the Rust normalizer, and the backend's
//! declarative normalization.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
  Error, Metric, Result,
  fingerprint::fingerprint,
  ingest::RowError,
  normalize::normalize,
  record::{Fact, RawRecord},
  store::TradeStore,
};

/// Which implementation of the normalization rules computes the mart.
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
pub enum Strategy {
  #[default]
  Native,
  Sql,
}

/// Outcome of [`rebuild`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializeReport {
  pub strategy:        Strategy,
  pub raw_rows:        usize,
  pub facts_written:   usize,
  /// Raw rows whose period key did not decode (native strategy only; the
  /// SQL strategy skips them without a reason).
  pub rejected:        Vec<RowError>,
  /// Stored metric names outside the vocabulary. Always empty unless the
  /// store was written around the normalizer.
  pub unknown_metrics: Vec<String>,
  pub fingerprint:     String,
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
  pub mart_fingerprint:   String,
  pub native_fingerprint: String,
  pub sql_fingerprint:    String,
  pub unknown_metrics:    Vec<String>,
  /// Stored mart, native, and SQL normalization all agree and the vocabulary
  /// holds.
  pub consistent:         bool,
}

/// Collapse facts that land in the same `(period_date, category_code,
/// metric)` slot, keeping the last one. Two raw keys can alias one slot
/// (`202101` and `TIIDX-202101`); the mart stores only one of them.
pub fn dedupe_facts(facts: Vec<Fact>) -> Vec<Fact> {
  let mut slots: HashMap<(NaiveDate, String, Metric), usize> = HashMap::new();
  let mut out: Vec<Fact> = Vec::with_capacity(facts.len());
  for fact in facts {
    let key = (fact.period_date, fact.category_code.clone(), fact.metric);
    match slots.get(&key) {
      Some(&idx) => out[idx] = fact,
      None => {
        slots.insert(key, out.len());
        out.push(fact);
      }
    }
  }
  out
}

/// Run the Rust normalizer over every raw record.
///
/// Returns one fact per mart slot, in raw-table order of first appearance,
/// plus one [`RowError`] per raw record that could not be normalized. The
/// line number is the record's position in the raw table.
pub fn normalize_all(raws: &[RawRecord]) -> (Vec<Fact>, Vec<RowError>) {
  let mut facts = Vec::new();
  let mut rejected = Vec::new();
  for (idx, raw) in raws.iter().enumerate() {
    match normalize(raw) {
      Ok(n) => facts.extend(n.facts),
      Err(e) => rejected.push(RowError::new(idx + 1, &e)),
    }
  }
  (dedupe_facts(facts), rejected)
}

async fn unknown_metrics<S: TradeStore>(store: &S) -> Result<Vec<String>> {
  let names = store.metric_names().await.map_err(Error::store)?;
  Ok(
    names
      .into_iter()
      .filter(|n| Metric::from_name(n).is_err())
      .collect(),
  )
}

/// Recompute the entire mart from the raw table and swap it in atomically,
/// then validate the stored metric vocabulary.
pub async fn rebuild<S: TradeStore>(
  store: &S,
  strategy: Strategy,
) -> Result<MaterializeReport> {
  let raws = store.list_raw().await.map_err(Error::store)?;

  let (facts, rejected) = match strategy {
    Strategy::Native => normalize_all(&raws),
    Strategy::Sql => (
      dedupe_facts(store.normalize_in_store().await.map_err(Error::store)?),
      Vec::new(),
    ),
  };
  for r in &rejected {
    warn!(line = r.line, message = %r.message, "raw row skipped during materialization");
  }

  let facts_written = facts.len();
  store.replace_mart(facts).await.map_err(Error::store)?;

  let unknown_metrics = unknown_metrics(store).await?;
  let stored = store.all_facts().await.map_err(Error::store)?;
  let fingerprint = fingerprint(&stored);

  info!(
    %strategy,
    raw_rows = raws.len(),
    facts_written,
    rejected = rejected.len(),
    %fingerprint,
    "mart rebuilt"
  );

  Ok(MaterializeReport {
    strategy,
    raw_rows: raws.len(),
    facts_written,
    rejected,
    unknown_metrics,
    fingerprint,
  })
}

/// Compare the stored mart against both normalization implementations
/// without writing anything.
pub async fn verify<S: TradeStore>(store: &S) -> Result<VerifyReport> {
  let raws = store.list_raw().await.map_err(Error::store)?;
  let (native, _) = normalize_all(&raws);
  let sql = dedupe_facts(store.normalize_in_store().await.map_err(Error::store)?);
  let mart = store.all_facts().await.map_err(Error::store)?;
  let unknown_metrics = unknown_metrics(store).await?;

  let mart_fingerprint = fingerprint(&mart);
  let native_fingerprint = fingerprint(&native);
  let sql_fingerprint = fingerprint(&sql);

  let consistent = unknown_metrics.is_empty()
    && mart_fingerprint == native_fingerprint
    && native_fingerprint == sql_fingerprint;
  if !consistent {
    warn!(
      %mart_fingerprint,
      %native_fingerprint,
      %sql_fingerprint,
      unknown = unknown_metrics.len(),
      "mart is inconsistent with raw table"
    );
  }

  Ok(VerifyReport {
    mart_fingerprint,
    native_fingerprint,
    sql_fingerprint,
    unknown_metrics,
    consistent,
  })
}
