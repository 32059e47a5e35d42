//! Where feed text comes from: the bundled fixture, a local file, or the
//! upstream HTTP endpoint.

use std::{future::Future, path::PathBuf, time::Duration};

use pulse_core::{Error, Result, ingest::IngestMode};
use serde::Deserialize;
use tracing::{debug, info};

/// Three months (2021-01..2021-03) of four trade categories, in the upstream
/// format: semicolon-delimited with decimal commas.
pub const BUNDLED_FIXTURE: &str = include_str!("../fixtures/statat_trade_sample.csv");

/// Statistik Austria open-data CSV for the monthly trade indices.
pub const DEFAULT_DATA_URL: &str =
  "https://data.statistik.gv.at/data/OGD_konjidxhan21_KJIX_H_21_1.csv";

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Produces the raw feed document for an ingestion mode.
///
/// Implementations must not touch the store; any failure here aborts the run
/// before anything is written.
pub trait FeedSource: Send + Sync {
  fn fetch(&self, mode: IngestMode) -> impl Future<Output = Result<String>> + Send + '_;
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  pub data_url:           String,
  /// Replaces the bundled fixture in mock mode.
  pub fixture_path:       Option<PathBuf>,
  pub fetch_timeout_secs: u64,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      data_url:           DEFAULT_DATA_URL.to_owned(),
      fixture_path:       None,
      fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
    }
  }
}

// ─── HTTP source ─────────────────────────────────────────────────────────────

/// The production [`FeedSource`].
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpSource {
  client: reqwest::Client,
  config: SourceConfig,
}

impl HttpSource {
  pub fn new(config: SourceConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.fetch_timeout_secs))
      .build()
      .map_err(|e| Error::IngestionFailed(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &SourceConfig { &self.config }

  async fn load_fixture(&self) -> Result<String> {
    match &self.config.fixture_path {
      Some(path) => {
        debug!(?path, "reading fixture file");
        tokio::fs::read_to_string(path).await.map_err(|e| {
          Error::IngestionFailed(format!("reading fixture {}: {e}", path.display()))
        })
      }
      None => Ok(BUNDLED_FIXTURE.to_owned()),
    }
  }

  async fn download(&self) -> Result<String> {
    let url = &self.config.data_url;
    info!(%url, "downloading feed");

    let resp = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| Error::IngestionFailed(format!("GET {url} failed: {e}")))?;

    if !resp.status().is_success() {
      return Err(Error::IngestionFailed(format!("GET {url} → {}", resp.status())));
    }
    resp
      .text()
      .await
      .map_err(|e| Error::IngestionFailed(format!("reading body of {url}: {e}")))
  }
}

impl FeedSource for HttpSource {
  async fn fetch(&self, mode: IngestMode) -> Result<String> {
    match mode {
      IngestMode::Mock => self.load_fixture().await,
      IngestMode::Live => self.download().await,
    }
  }
}
