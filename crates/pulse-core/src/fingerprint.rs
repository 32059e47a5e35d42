//! Order-independent digest of a fact set.
//!
//! Two mart states with the same fingerprint hold the same observations. The
//! ingestion timestamp is left out on purpose: replaying the same feed
//! refreshes every timestamp but must not count as a change.

use sha2::{Digest, Sha256};

use crate::record::Fact;

/// SHA-256 over the sorted `(period_date, category_code, metric, value)`
/// tuples, hex-encoded.
///
/// Stable: same facts in any order → same fingerprint.
pub fn fingerprint(facts: &[Fact]) -> String {
  let mut lines: Vec<String> = facts
    .iter()
    .map(|f| {
      format!(
        "{}|{}|{}|{:016x}",
        f.period_date,
        f.category_code,
        f.metric,
        f.value.to_bits()
      )
    })
    .collect();
  lines.sort_unstable();

  let mut hasher = Sha256::new();
  for line in &lines {
    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }
  hex::encode(hasher.finalize())
}
