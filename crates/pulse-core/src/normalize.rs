//! Wide raw rows → long-form facts.
//!
//! Pure and synchronous. The same rules are expressed declaratively in the
//! SQLite backend's materialization query; the two must agree.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  record::{Fact, NormalizedRecord, RawRecord},
};

/// Namespace prefix carried by every category key in the feed.
pub const CATEGORY_PREFIX: &str = "NACEIDX-";

fn is_digits(s: &str, len: usize) -> bool {
  s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Decode a period key into the first day of its month.
///
/// Accepted shapes (after trimming): `YYYYMM`, `YYYY-MM`, and
/// `<anything>-YYYYMM` such as `TIIDX-202101`.
pub fn decode_period_key(key: &str) -> Result<NaiveDate> {
  let trimmed = key.trim();
  let bytes = trimmed.as_bytes();

  let ym = if is_digits(trimmed, 6) {
    trimmed.to_owned()
  } else if bytes.len() == 7
    && bytes[..4].iter().all(u8::is_ascii_digit)
    && bytes[4] == b'-'
    && bytes[5..].iter().all(u8::is_ascii_digit)
  {
    // All ASCII, so byte slicing is on char boundaries.
    format!("{}{}", &trimmed[..4], &trimmed[5..])
  } else if let Some((_, tail)) = trimmed.rsplit_once('-')
    && is_digits(tail, 6)
  {
    tail.to_owned()
  } else {
    return Err(Error::MalformedPeriodKey(key.to_owned()));
  };

  let year: i32 = ym[..4]
    .parse()
    .map_err(|_| Error::MalformedPeriodKey(key.to_owned()))?;
  let month: u32 = ym[4..]
    .parse()
    .map_err(|_| Error::MalformedPeriodKey(key.to_owned()))?;

  NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| Error::MalformedPeriodKey(key.to_owned()))
}

/// Strip the classification namespace from a category key.
pub fn decode_category_key(key: &str) -> String {
  let trimmed = key.trim();
  trimmed
    .strip_prefix(CATEGORY_PREFIX)
    .unwrap_or(trimmed)
    .to_owned()
}

/// Normalize one raw row into its mart slot.
///
/// Emits one fact per non-null metric, value and timestamp copied verbatim.
/// Fails only when the period key does not decode; the caller reports that
/// row rather than dropping it silently.
pub fn normalize(record: &RawRecord) -> Result<NormalizedRecord> {
  let period_date = decode_period_key(&record.period_key)?;
  let category_code = decode_category_key(&record.category_key);

  let facts = record
    .values
    .present()
    .map(|(metric, value)| Fact {
      period_date,
      category_code: category_code.clone(),
      metric,
      value,
      ingested_at: record.ingested_at,
    })
    .collect();

  Ok(NormalizedRecord { period_date, category_code, facts })
}
