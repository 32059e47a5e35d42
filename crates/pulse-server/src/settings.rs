//! Runtime configuration: built-in defaults, then `config.toml`, then
//! `PULSE_*` environment variables.

use std::path::{Path, PathBuf};

use pulse_ingest::{
  SourceConfig,
  source::{DEFAULT_DATA_URL, DEFAULT_FETCH_TIMEOUT_SECS},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub data_url:           String,
  /// Replaces the bundled fixture for `mock` ingestion.
  pub fixture_path:       Option<PathBuf>,
  pub fetch_timeout_secs: u64,
}

impl Settings {
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8000)?
      .set_default("store_path", "trade-pulse.db")?
      .set_default("data_url", DEFAULT_DATA_URL)?
      .set_default("fetch_timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("PULSE"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn source(&self) -> SourceConfig {
    SourceConfig {
      data_url:           self.data_url.clone(),
      fixture_path:       self.fixture_path.as_deref().map(expand_tilde),
      fetch_timeout_secs: self.fetch_timeout_secs,
    }
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
