//! trade-pulse binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the JSON API or runs a single pipeline step and
//! prints its report.
//!
//! ```text
//! trade-pulse serve
//! trade-pulse ingest --mode live
//! trade-pulse materialize --strategy sql
//! trade-pulse materialize --verify
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pulse_api::AppState;
use pulse_core::{ingest::IngestMode, materialize::Strategy};
use pulse_ingest::HttpSource;
use pulse_store_sqlite::SqliteStore;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[derive(Parser)]
#[command(author, version, about = "Austrian retail & wholesale trade-index pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,
  /// Run one ingestion and print its stats.
  Ingest {
    /// `mock` reads the bundled fixture; `live` downloads the upstream feed.
    #[arg(long, default_value = "mock")]
    mode: IngestMode,
  },
  /// Rebuild the mart from the raw table, or only check it.
  Materialize {
    /// Compare the mart with both normalizers without writing.
    #[arg(long)]
    verify: bool,
    #[arg(long, default_value = "native")]
    strategy: Strategy,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config).context("failed to read configuration")?;

  let store_path = settings.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let source = HttpSource::new(settings.source()).context("failed to build feed source")?;
  let state = AppState::new(Arc::new(store), source);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(state, &settings.address()).await,
    Command::Ingest { mode } => {
      let stats = state.pipeline.ingest(mode).await?;
      print_json(&stats)
    }
    Command::Materialize { verify: true, .. } => {
      let report =
        pulse_core::materialize::verify(state.engine.store().as_ref()).await?;
      print_json(&report)?;
      if !report.consistent {
        anyhow::bail!("mart is inconsistent with the raw table");
      }
      Ok(())
    }
    Command::Materialize { strategy, .. } => {
      let report = state.pipeline.materialize(strategy).await?;
      print_json(&report)
    }
  }
}

async fn serve(state: AppState<SqliteStore, HttpSource>, address: &str) -> anyhow::Result<()> {
  let app = pulse_api::api_router(state).layer(TraceLayer::new_for_http());

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
