//! [`SqliteStore`], the SQLite implementation of [`TradeStore`].

use std::path::Path;

use pulse_core::{
  Metric,
  record::{Fact, RawRecord},
  store::{CoincidentPair, IngestBatch, SeriesQuery, TradeStore},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Result,
  encode::{FactRow, RawTradeRow, decode_date, encode_date},
  schema::{NORMALIZE_SQL, SCHEMA},
};

const UPSERT_RAW: &str = "
INSERT INTO raw_trade (
    period_key, category_key,
    uidxnom, uidxreal, beschidx, uidxnsb, uidxrsb,
    ingested_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (period_key, category_key) DO UPDATE SET
    uidxnom     = excluded.uidxnom,
    uidxreal    = excluded.uidxreal,
    beschidx    = excluded.beschidx,
    uidxnsb     = excluded.uidxnsb,
    uidxrsb     = excluded.uidxrsb,
    ingested_at = excluded.ingested_at";

const UPSERT_FACT: &str = "
INSERT INTO trade_index (period_date, category_code, metric, value, ingested_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT (period_date, category_code, metric) DO UPDATE SET
    value       = excluded.value,
    ingested_at = excluded.ingested_at";

const CLEAR_SLOT: &str =
  "DELETE FROM trade_index WHERE period_date = ?1 AND category_code = ?2";

const FACT_COLUMNS: &str = "period_date, category_code, metric, value, ingested_at";

// ─── Statement helpers ───────────────────────────────────────────────────────

fn write_raw(tx: &rusqlite::Transaction<'_>, rows: &[RawTradeRow]) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(UPSERT_RAW)?;
  for r in rows {
    stmt.execute(rusqlite::params![
      r.period_key,
      r.category_key,
      r.values[0],
      r.values[1],
      r.values[2],
      r.values[3],
      r.values[4],
      r.ingested_at,
    ])?;
  }
  Ok(())
}

fn write_facts(tx: &rusqlite::Transaction<'_>, rows: &[FactRow]) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare_cached(UPSERT_FACT)?;
  for f in rows {
    stmt.execute(rusqlite::params![
      f.period_date,
      f.category_code,
      f.metric,
      f.value,
      f.ingested_at,
    ])?;
  }
  Ok(())
}

/// `IN (...)` list of the vocabulary, for reads that must not trip over rows
/// written around the normalizer.
fn known_metrics_sql() -> String {
  Metric::all()
    .map(|m| format!("'{}'", m.as_str()))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A trade-pulse store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    debug!(?path, "sqlite store opened");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    debug!("in-memory sqlite store opened");
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_facts(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Fact>> {
    let rows: Vec<FactRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), FactRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.into_iter().map(FactRow::into_fact).collect()
  }
}

// ─── TradeStore impl ─────────────────────────────────────────────────────────

impl TradeStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn apply_batch(&self, batch: IngestBatch) -> Result<()> {
    let raw: Vec<RawTradeRow> = batch.raw.iter().map(RawTradeRow::encode).collect();
    let slots: Vec<(String, String, Vec<FactRow>)> = batch
      .normalized
      .iter()
      .map(|n| {
        (
          encode_date(n.period_date),
          n.category_code.clone(),
          n.facts.iter().map(FactRow::encode).collect(),
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        write_raw(&tx, &raw)?;
        {
          let mut clear = tx.prepare_cached(CLEAR_SLOT)?;
          for (date, code, facts) in &slots {
            clear.execute(rusqlite::params![date, code])?;
            write_facts(&tx, facts)?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_raw(&self, records: Vec<RawRecord>) -> Result<()> {
    let rows: Vec<RawTradeRow> = records.iter().map(RawTradeRow::encode).collect();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        write_raw(&tx, &rows)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_facts(&self, facts: Vec<Fact>) -> Result<()> {
    let rows: Vec<FactRow> = facts.iter().map(FactRow::encode).collect();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        write_facts(&tx, &rows)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn replace_mart(&self, facts: Vec<Fact>) -> Result<()> {
    let rows: Vec<FactRow> = facts.iter().map(FactRow::encode).collect();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM trade_index", [])?;
        write_facts(&tx, &rows)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn reset(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM trade_index", [])?;
        tx.execute("DELETE FROM raw_trade", [])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Full reads ────────────────────────────────────────────────────────────

  async fn list_raw(&self) -> Result<Vec<RawRecord>> {
    let rows: Vec<RawTradeRow> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT period_key, category_key,
                  uidxnom, uidxreal, beschidx, uidxnsb, uidxrsb,
                  ingested_at
           FROM raw_trade
           ORDER BY period_key, category_key",
        )?;
        let rows = stmt
          .query_map([], RawTradeRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows.into_iter().map(RawTradeRow::into_record).collect()
  }

  async fn all_facts(&self) -> Result<Vec<Fact>> {
    let sql = format!(
      "SELECT {FACT_COLUMNS} FROM trade_index
       WHERE metric IN ({})
       ORDER BY period_date, category_code, metric",
      known_metrics_sql()
    );
    self.query_facts(sql, Vec::new()).await
  }

  async fn normalize_in_store(&self) -> Result<Vec<Fact>> {
    self.query_facts(NORMALIZE_SQL.to_owned(), Vec::new()).await
  }

  async fn metric_names(&self) -> Result<Vec<String>> {
    let names = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT DISTINCT metric FROM trade_index ORDER BY metric")?;
        let names = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
      })
      .await?;
    Ok(names)
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  async fn list_categories(&self) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT DISTINCT category_code FROM trade_index
       WHERE metric IN ({})
       ORDER BY category_code",
      known_metrics_sql()
    );
    let codes = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let codes = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(codes)
      })
      .await?;
    Ok(codes)
  }

  async fn series(&self, query: &SeriesQuery) -> Result<Vec<Fact>> {
    use rusqlite::types::Value;

    let sql = format!(
      "SELECT {FACT_COLUMNS} FROM trade_index
       WHERE category_code = ?1
         AND metric = ?2
         AND (?3 IS NULL OR period_date >= ?3)
         AND (?4 IS NULL OR period_date <= ?4)
       ORDER BY period_date ASC
       LIMIT ?5"
    );
    let date = |d: Option<chrono::NaiveDate>| {
      d.map(encode_date).map_or(Value::Null, Value::Text)
    };
    // LIMIT -1 is SQLite for "no limit".
    let limit = query
      .limit
      .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let params = vec![
      Value::Text(query.category_code.clone()),
      Value::Text(query.metric.as_str().to_owned()),
      date(query.start),
      date(query.end),
      Value::Integer(limit),
    ];
    self.query_facts(sql, params).await
  }

  async fn latest_facts(
    &self,
    category_code: &str,
    metric: Metric,
    n: usize,
  ) -> Result<Vec<Fact>> {
    use rusqlite::types::Value;

    let sql = format!(
      "SELECT {FACT_COLUMNS} FROM trade_index
       WHERE category_code = ?1 AND metric = ?2
       ORDER BY period_date DESC
       LIMIT ?3"
    );
    let params = vec![
      Value::Text(category_code.to_owned()),
      Value::Text(metric.as_str().to_owned()),
      Value::Integer(i64::try_from(n).unwrap_or(i64::MAX)),
    ];
    self.query_facts(sql, params).await
  }

  async fn latest_coincident(
    &self,
    category_code: &str,
    first: Metric,
    second: Metric,
  ) -> Result<Option<CoincidentPair>> {
    let code = category_code.to_owned();
    let first = first.as_str();
    let second = second.as_str();

    let raw: Option<(String, f64, f64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT a.period_date, a.value, b.value
               FROM trade_index a
               JOIN trade_index b
                 ON b.period_date   = a.period_date
                AND b.category_code = a.category_code
                AND b.metric        = ?3
               WHERE a.category_code = ?1 AND a.metric = ?2
               ORDER BY a.period_date DESC
               LIMIT 1",
              rusqlite::params![code, first, second],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(date, first, second)| {
        Ok(CoincidentPair { period_date: decode_date(&date)?, first, second })
      })
      .transpose()
  }

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
