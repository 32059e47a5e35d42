//! Feed parser.
//!
//! Pipeline:
//!   raw &str
//!     └─ sniff_delimiter()     → u8
//!          └─ resolve_columns()  → ColumnMap   (header-level; fatal)
//!               └─ parse_row()     → RawRecord (row-level; counted)

use chrono::{DateTime, Utc};
use csv::StringRecord;
use pulse_core::{
  Metric,
  ingest::RowError,
  normalize::decode_category_key,
  record::{MetricValues, RawRecord},
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ─── Column vocabulary ───────────────────────────────────────────────────────

const PERIOD_COLUMN: &str = "C-TI-0";
const CATEGORY_COLUMN: &str = "C-NACEIDX-0";

/// Value prefixes used to locate key columns whose header is unrecognised.
const PERIOD_VALUE_PREFIX: &str = "TIIDX-";
const CATEGORY_VALUE_PREFIX: &str = "NACEIDX-";

const REQUIRED_METRICS: [(&str, Metric); 3] = [
  ("F-UIDXNOM", Metric::Nominal),
  ("F-UIDXREAL", Metric::Real),
  ("F-BESCHIDX", Metric::Employment),
];

const OPTIONAL_METRICS: [(&str, Metric); 2] = [
  ("F-UIDXNSB", Metric::NominalAdjusted),
  ("F-UIDXRSB", Metric::RealAdjusted),
];

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Rows inspected when guessing key and month columns from their contents.
const SAMPLE_ROWS: usize = 200;

// ─── Output ──────────────────────────────────────────────────────────────────

/// The result of parsing one feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
  /// One record per accepted data row, in source order.
  pub records:         Vec<RawRecord>,
  /// Source line of each record, parallel to `records`.
  pub lines:           Vec<usize>,
  /// One entry per rejected data row.
  pub row_errors:      Vec<RowError>,
  /// Data rows seen, header excluded.
  pub rows_read:       usize,
  /// Header labels of `F-` columns outside the metric vocabulary.
  pub ignored_columns: Vec<String>,
}

struct ColumnMap {
  period:   usize,
  category: usize,
  metrics:  Vec<(Metric, usize)>,
  /// Month-of-year column, used to complete year-only period values.
  month:    Option<usize>,
  ignored:  Vec<String>,
}

// ─── Low-level helpers ───────────────────────────────────────────────────────

/// Normalise a header label for matching: trim, strip a UTF-8 BOM,
/// upper-case, drop spaces, and treat `_` as `-`.
fn normalize_header(name: &str) -> String {
  name
    .trim()
    .trim_start_matches('\u{feff}')
    .to_uppercase()
    .replace(' ', "")
    .replace('_', "-")
}

fn header_matches(normalized: &str, target: &str) -> bool {
  normalized == target || normalized.ends_with(target) || normalized.starts_with(target)
}

fn find_header(headers: &[String], target: &str) -> Option<usize> {
  headers.iter().position(|h| header_matches(h, target))
}

/// Pick the candidate delimiter that occurs most often in the header line.
fn sniff_delimiter(text: &str) -> u8 {
  let header = text.lines().next().unwrap_or_default();
  DELIMITERS
    .iter()
    .copied()
    .map(|d| (d, header.bytes().filter(|b| *b == d).count()))
    .filter(|(_, n)| *n > 0)
    .max_by_key(|(_, n)| *n)
    .map(|(d, _)| d)
    .unwrap_or(b',')
}

fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
  record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a numeric cell that may use `,` as decimal separator.
///
/// `Ok(None)` for an empty cell; `Err` for anything present but unreadable.
fn parse_decimal(raw: Option<&str>) -> std::result::Result<Option<f64>, String> {
  let Some(raw) = raw else { return Ok(None) };
  let cleaned = raw.replace(' ', "").replace(',', ".");
  if cleaned.is_empty() {
    return Ok(None);
  }
  match cleaned.parse::<f64>() {
    Ok(v) if v.is_finite() => Ok(Some(v)),
    _ => Err(raw.to_owned()),
  }
}

fn is_year(s: &str) -> bool { s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) }

/// First column whose sampled values start with `prefix`.
fn find_by_content(rows: &[StringRecord], width: usize, prefix: &str) -> Option<usize> {
  (0..width).find(|&idx| {
    rows
      .iter()
      .take(SAMPLE_ROWS)
      .any(|r| r.get(idx).is_some_and(|v| v.trim().starts_with(prefix)))
  })
}

/// First column, outside `taken`, whose sampled non-empty values are all
/// integers in 1..=12.
fn find_month_column(rows: &[StringRecord], width: usize, taken: &[usize]) -> Option<usize> {
  (0..width).filter(|idx| !taken.contains(idx)).find(|&idx| {
    let mut sampled = rows
      .iter()
      .take(SAMPLE_ROWS)
      .filter_map(|r| cell(r, idx))
      .peekable();
    sampled.peek().is_some()
      && sampled.all(|v| v.parse::<u32>().is_ok_and(|m| (1..=12).contains(&m)))
  })
}

// ─── Header resolution ───────────────────────────────────────────────────────

fn resolve_columns(header: &StringRecord, rows: &[StringRecord]) -> Result<ColumnMap> {
  let headers: Vec<String> = header.iter().map(normalize_header).collect();
  let width = headers.len();

  let period = find_header(&headers, PERIOD_COLUMN)
    .or_else(|| find_by_content(rows, width, PERIOD_VALUE_PREFIX));
  let category = find_header(&headers, CATEGORY_COLUMN)
    .or_else(|| find_by_content(rows, width, CATEGORY_VALUE_PREFIX));

  let mut missing: Vec<&str> = Vec::new();
  if period.is_none() {
    missing.push(PERIOD_COLUMN);
  }
  if category.is_none() {
    missing.push(CATEGORY_COLUMN);
  }

  let mut metrics = Vec::new();
  for (column, metric) in REQUIRED_METRICS {
    match find_header(&headers, column) {
      Some(idx) => metrics.push((metric, idx)),
      None => missing.push(column),
    }
  }

  let (Some(period), Some(category)) = (period, category) else {
    return Err(missing_columns(&missing, header));
  };
  if !missing.is_empty() {
    return Err(missing_columns(&missing, header));
  }

  for (column, metric) in OPTIONAL_METRICS {
    if let Some(idx) = find_header(&headers, column) {
      metrics.push((metric, idx));
    }
  }

  let mut ignored = Vec::new();
  for (idx, name) in headers.iter().enumerate() {
    if name.starts_with("F-") && !metrics.iter().any(|(_, i)| *i == idx) {
      let label = header.get(idx).unwrap_or_default().trim().to_owned();
      warn!(column = %label, "ignoring unknown metric column");
      ignored.push(label);
    }
  }

  let needs_month = rows
    .iter()
    .take(SAMPLE_ROWS)
    .any(|r| cell(r, period).is_some_and(is_year));
  let month = if needs_month {
    let mut taken = vec![period, category];
    taken.extend(metrics.iter().map(|(_, i)| *i));
    find_month_column(rows, width, &taken)
  } else {
    None
  };

  Ok(ColumnMap { period, category, metrics, month, ignored })
}

fn missing_columns(missing: &[&str], header: &StringRecord) -> Error {
  Error::MissingColumns {
    missing: missing.join(", "),
    headers: header.iter().take(20).collect::<Vec<_>>().join(", "),
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

fn parse_row(
  record: &StringRecord,
  columns: &ColumnMap,
  ingested_at: DateTime<Utc>,
) -> pulse_core::Result<RawRecord> {
  let mut period_key = cell(record, columns.period)
    .ok_or_else(|| pulse_core::Error::SourceFormat("missing period key".into()))?
    .to_owned();
  let category_key = cell(record, columns.category)
    .ok_or_else(|| pulse_core::Error::SourceFormat("missing category key".into()))?
    .to_owned();

  if is_year(&period_key)
    && let Some(month) = columns
      .month
      .and_then(|idx| cell(record, idx))
      .and_then(|m| m.parse::<u32>().ok())
  {
    period_key = format!("{period_key}{month:02}");
  }

  if decode_category_key(&category_key).is_empty() {
    return Err(pulse_core::Error::SourceFormat(format!(
      "empty category code in {category_key:?}"
    )));
  }

  let mut values = MetricValues::default();
  for (metric, idx) in &columns.metrics {
    let value = parse_decimal(cell(record, *idx)).map_err(|raw| {
      pulse_core::Error::SourceFormat(format!("unparseable {metric} value {raw:?}"))
    })?;
    values.set(*metric, value);
  }

  Ok(RawRecord { period_key, category_key, values, ingested_at })
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Parse a whole feed document.
///
/// Fails only when the header cannot be mapped onto the required columns;
/// every other problem rejects the offending row and is recorded in
/// [`ParsedFeed::row_errors`]. Every record is stamped with `ingested_at`.
pub fn parse_feed(text: &str, ingested_at: DateTime<Utc>) -> Result<ParsedFeed> {
  let text = text.trim_start_matches('\u{feff}');
  if text.trim().is_empty() {
    return Ok(ParsedFeed::default());
  }

  let delimiter = sniff_delimiter(text);
  debug!(delimiter = ?(delimiter as char), "sniffed feed delimiter");

  let mut reader = csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .has_headers(false)
    .flexible(true)
    .from_reader(text.as_bytes());

  let mut records = reader.records();
  let header = match records.next() {
    Some(h) => h?,
    None => return Ok(ParsedFeed::default()),
  };

  let mut feed = ParsedFeed::default();
  let mut rows: Vec<(usize, StringRecord)> = Vec::new();
  for (idx, result) in records.enumerate() {
    // +2: 1-based, and the header occupies line 1.
    let line = idx + 2;
    feed.rows_read += 1;
    match result {
      Ok(r) if r.iter().all(|c| c.trim().is_empty()) => feed.rows_read -= 1,
      Ok(r) => rows.push((line, r)),
      Err(e) => feed.row_errors.push(RowError::new(
        line,
        &pulse_core::Error::SourceFormat(format!("CSV parse error: {e}")),
      )),
    }
  }

  let sample: Vec<StringRecord> =
    rows.iter().take(SAMPLE_ROWS).map(|(_, r)| r.clone()).collect();
  let columns = resolve_columns(&header, &sample)?;
  feed.ignored_columns = columns.ignored.clone();

  for (line, record) in &rows {
    match parse_row(record, &columns, ingested_at) {
      Ok(raw) => {
        feed.records.push(raw);
        feed.lines.push(*line);
      }
      Err(e) => {
        warn!(line, error = %e, "rejecting feed row");
        feed.row_errors.push(RowError::new(*line, &e));
      }
    }
  }

  Ok(feed)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() }

  const HEADER: &str =
    "C-TI-0;C-NACEIDX-0;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX;F-UIDXNSB;F-UIDXRSB";

  // ── Happy path ───────────────────────────────────────────────────────────

  #[test]
  fn semicolon_feed_with_comma_decimals() {
    let text = format!(
      "{HEADER}\nTIIDX-202101;NACEIDX-G47;96,1;94,0;99,2;95,5;93,8\n\
       TIIDX-202102;NACEIDX-G47;97,0;;99,0;;\n"
    );
    let feed = parse_feed(&text, now()).unwrap();

    assert_eq!(feed.rows_read, 2);
    assert!(feed.row_errors.is_empty());
    assert_eq!(feed.records.len(), 2);
    assert_eq!(feed.lines, vec![2, 3]);

    let first = &feed.records[0];
    assert_eq!(first.period_key, "TIIDX-202101");
    assert_eq!(first.category_key, "NACEIDX-G47");
    assert_eq!(first.values.nominal, Some(96.1));
    assert_eq!(first.values.real_adjusted, Some(93.8));
    assert_eq!(first.ingested_at, now());

    let second = &feed.records[1];
    assert_eq!(second.values.real, None);
    assert_eq!(second.values.present_count(), 2);
  }

  #[test]
  fn comma_feed_with_bom_and_lowercase_headers() {
    let text = "\u{feff}c_ti_0,c_naceidx_0,f_uidxnom,f_uidxreal,f_beschidx\n\
                202103,G46,101.5,99.0,100.25\n";
    let feed = parse_feed(text, now()).unwrap();
    assert_eq!(feed.records.len(), 1);
    assert_eq!(feed.records[0].period_key, "202103");
    assert_eq!(feed.records[0].values.employment, Some(100.25));
    // Optional columns absent entirely → null.
    assert_eq!(feed.records[0].values.nominal_adjusted, None);
  }

  #[test]
  fn key_columns_found_by_content() {
    let text = "Zeit;Branche;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX\n\
                TIIDX-202101;NACEIDX-G;100;98;97\n";
    let feed = parse_feed(text, now()).unwrap();
    assert_eq!(feed.records.len(), 1);
    assert_eq!(feed.records[0].period_key, "TIIDX-202101");
    assert_eq!(feed.records[0].category_key, "NACEIDX-G");
  }

  #[test]
  fn year_only_period_is_completed_from_month_column() {
    let text = "C-TI-0;MONAT;C-NACEIDX-0;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX\n\
                2021;1;NACEIDX-G;100;98;97\n\
                2021;11;NACEIDX-G;101;99;97\n";
    let feed = parse_feed(text, now()).unwrap();
    let keys: Vec<&str> = feed.records.iter().map(|r| r.period_key.as_str()).collect();
    assert_eq!(keys, ["202101", "202111"]);
  }

  #[test]
  fn unknown_metric_columns_are_reported() {
    let text = "C-TI-0;C-NACEIDX-0;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX;F-UMSATZ\n\
                TIIDX-202101;NACEIDX-G;100;98;97;12,5\n";
    let feed = parse_feed(text, now()).unwrap();
    assert_eq!(feed.ignored_columns, vec!["F-UMSATZ"]);
    assert_eq!(feed.records[0].values.present_count(), 3);

    let feed = parse_feed(&format!("{HEADER}\nTIIDX-202101;NACEIDX-G;1;2;3;;\n"), now()).unwrap();
    assert!(feed.ignored_columns.is_empty());
  }

  #[test]
  fn blank_lines_are_not_rows() {
    let text = format!("{HEADER}\nTIIDX-202101;NACEIDX-G;1;2;3;;\n;;;;;;\n");
    let feed = parse_feed(&text, now()).unwrap();
    assert_eq!(feed.rows_read, 1);
    assert_eq!(feed.records.len(), 1);
  }

  #[test]
  fn empty_source_is_empty_feed() {
    let feed = parse_feed("", now()).unwrap();
    assert_eq!(feed.rows_read, 0);
    assert!(feed.records.is_empty());
    let feed = parse_feed(&format!("{HEADER}\n"), now()).unwrap();
    assert!(feed.records.is_empty());
  }

  // ── Header-level failures ────────────────────────────────────────────────

  #[test]
  fn missing_required_metric_column_is_fatal() {
    let text = "C-TI-0;C-NACEIDX-0;F-UIDXNOM;F-BESCHIDX\nTIIDX-202101;NACEIDX-G;1;2\n";
    let err = parse_feed(text, now()).unwrap_err();
    assert!(
      matches!(err, Error::MissingColumns { ref missing, .. } if missing == "F-UIDXREAL")
    );
    let core: pulse_core::Error = err.into();
    assert_eq!(core.kind(), "source_format_error");
  }

  #[test]
  fn unlocatable_key_columns_are_fatal() {
    let text = "A;B;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX\nx;y;1;2;3\n";
    let err = parse_feed(text, now()).unwrap_err();
    assert!(
      matches!(err, Error::MissingColumns { ref missing, .. } if missing == "C-TI-0, C-NACEIDX-0")
    );
  }

  // ── Row-level failures ───────────────────────────────────────────────────

  #[test]
  fn bad_rows_are_counted_not_fatal() {
    let text = format!(
      "{HEADER}\n\
       TIIDX-202101;NACEIDX-G;100;98;97;;\n\
       ;NACEIDX-G;100;98;97;;\n\
       TIIDX-202102;;100;98;97;;\n\
       TIIDX-202103;NACEIDX-G;abc;98;97;;\n\
       TIIDX-202104;NACEIDX-;100;98;97;;\n\
       TIIDX-202105;NACEIDX-G;101;99;97;;\n"
    );
    let feed = parse_feed(&text, now()).unwrap();
    assert_eq!(feed.rows_read, 6);
    assert_eq!(feed.records.len(), 2);
    let lines: Vec<usize> = feed.row_errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, [3, 4, 5, 6]);
    assert!(feed.row_errors.iter().all(|e| e.kind == "source_format_error"));
    assert!(feed.row_errors[2].message.contains("uidxnom"));
  }

  #[test]
  fn short_rows_treat_absent_metrics_as_null() {
    let text = format!("{HEADER}\nTIIDX-202101;NACEIDX-G;100\n");
    let feed = parse_feed(&text, now()).unwrap();
    assert_eq!(feed.records.len(), 1);
    assert_eq!(feed.records[0].values.present_count(), 1);
  }

  #[test]
  fn malformed_period_key_is_left_for_the_normalizer() {
    let text = format!("{HEADER}\nTIIDX-2021;NACEIDX-G;100;98;97;;\n");
    let feed = parse_feed(&text, now()).unwrap();
    assert_eq!(feed.records.len(), 1);
    assert!(feed.row_errors.is_empty());
  }

  // ── Helpers ──────────────────────────────────────────────────────────────

  #[test]
  fn decimal_parsing() {
    assert_eq!(parse_decimal(Some("96,1")), Ok(Some(96.1)));
    assert_eq!(parse_decimal(Some("1 024.5")), Ok(Some(1024.5)));
    assert_eq!(parse_decimal(None), Ok(None));
    assert!(parse_decimal(Some("n/a")).is_err());
    assert!(parse_decimal(Some("NaN")).is_err());
  }

  #[test]
  fn delimiter_sniffing() {
    assert_eq!(sniff_delimiter("a;b;c"), b';');
    assert_eq!(sniff_delimiter("a\tb\tc"), b'\t');
    assert_eq!(sniff_delimiter("a|b"), b'|');
    assert_eq!(sniff_delimiter("single"), b',');
  }
}
