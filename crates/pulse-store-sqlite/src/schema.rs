//! SQL schema and the declarative normalization query.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per source row. Upserts overwrite every column; no history.
CREATE TABLE IF NOT EXISTS raw_trade (
    period_key    TEXT NOT NULL,   -- e.g. TIIDX-202101
    category_key  TEXT NOT NULL,   -- e.g. NACEIDX-G47
    uidxnom       REAL,
    uidxreal      REAL,
    beschidx      REAL,
    uidxnsb       REAL,
    uidxrsb       REAL,
    ingested_at   TEXT NOT NULL,   -- RFC 3339 UTC
    PRIMARY KEY (period_key, category_key)
);

-- Long-form mart, derived from raw_trade. The metric vocabulary is checked
-- after materialization rather than by constraint.
CREATE TABLE IF NOT EXISTS trade_index (
    period_date   TEXT NOT NULL,   -- YYYY-MM-DD, first of month
    category_code TEXT NOT NULL,
    metric        TEXT NOT NULL,
    value         REAL NOT NULL,
    ingested_at   TEXT NOT NULL,
    PRIMARY KEY (period_date, category_code, metric)
);

CREATE INDEX IF NOT EXISTS trade_index_series_idx
    ON trade_index(category_code, metric, period_date);

PRAGMA user_version = 1;
";

/// `raw_trade` → long form, using the same rules as
/// `pulse_core::normalize`: period keys `YYYYMM`, `YYYY-MM` or `*-YYYYMM`
/// with month 01–12, and the `NACEIDX-` prefix stripped from category keys.
/// Rows whose period key does not decode contribute nothing.
pub const NORMALIZE_SQL: &str = "
WITH keyed AS (
    SELECT
        trim(period_key,   ' ' || char(9) || char(10) || char(13)) AS pk,
        trim(category_key, ' ' || char(9) || char(10) || char(13)) AS ck,
        uidxnom, uidxreal, beschidx, uidxnsb, uidxrsb, ingested_at
    FROM raw_trade
),
ym AS (
    SELECT *,
        CASE
            WHEN pk GLOB '[0-9][0-9][0-9][0-9][0-9][0-9]'
                THEN pk
            WHEN pk GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]'
                THEN substr(pk, 1, 4) || substr(pk, 6, 2)
            WHEN pk GLOB '*-[0-9][0-9][0-9][0-9][0-9][0-9]'
                THEN substr(pk, -6)
        END AS yyyymm
    FROM keyed
),
dated AS (
    SELECT
        substr(yyyymm, 1, 4) || '-' || substr(yyyymm, 5, 2) || '-01' AS period_date,
        CASE WHEN substr(ck, 1, 8) = 'NACEIDX-' THEN substr(ck, 9) ELSE ck END
            AS category_code,
        uidxnom, uidxreal, beschidx, uidxnsb, uidxrsb, ingested_at
    FROM ym
    WHERE yyyymm IS NOT NULL
      AND CAST(substr(yyyymm, 5, 2) AS INTEGER) BETWEEN 1 AND 12
)
SELECT period_date, category_code, 'uidxnom' AS metric, uidxnom AS value, ingested_at
    FROM dated WHERE uidxnom IS NOT NULL
UNION ALL
SELECT period_date, category_code, 'uidxreal', uidxreal, ingested_at
    FROM dated WHERE uidxreal IS NOT NULL
UNION ALL
SELECT period_date, category_code, 'beschidx', beschidx, ingested_at
    FROM dated WHERE beschidx IS NOT NULL
UNION ALL
SELECT period_date, category_code, 'uidxnsb', uidxnsb, ingested_at
    FROM dated WHERE uidxnsb IS NOT NULL
UNION ALL
SELECT period_date, category_code, 'uidxrsb', uidxrsb, ingested_at
    FROM dated WHERE uidxrsb IS NOT NULL
ORDER BY period_date, category_code, metric
";
