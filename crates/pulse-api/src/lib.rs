//! JSON REST API for trade-pulse.
//!
//! Exposes an axum [`Router`] over a [`QueryEngine`] for reads and a
//! [`Pipeline`] for ingestion and mart rebuilds, both sharing one
//! [`TradeStore`]. Tracing layers, TLS, and binding are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = pulse_api::AppState::new(store, source);
//! let app = pulse_api::api_router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod error;
pub mod health;
pub mod query;
pub mod runs;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use pulse_core::{query::QueryEngine, store::TradeStore};
use pulse_ingest::{FeedSource, Pipeline};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, F> {
  pub engine:   QueryEngine<S>,
  pub pipeline: Arc<Pipeline<S, F>>,
}

impl<S, F> Clone for AppState<S, F> {
  fn clone(&self) -> Self {
    Self {
      engine:   self.engine.clone(),
      pipeline: Arc::clone(&self.pipeline),
    }
  }
}

impl<S: TradeStore, F: FeedSource> AppState<S, F> {
  pub fn new(store: Arc<S>, source: F) -> Self {
    Self {
      engine:   QueryEngine::new(Arc::clone(&store)),
      pipeline: Arc::new(Pipeline::new(store, source)),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, F>(state: AppState<S, F>) -> Router<()>
where
  S: TradeStore + 'static,
  F: FeedSource + 'static,
{
  Router::new()
    .route("/health", get(health::handler::<S, F>))
    // Writes
    .route("/ingest", post(runs::ingest::<S, F>))
    .route("/materialize", post(runs::rebuild::<S, F>))
    .route("/materialize/verify", get(runs::verify::<S, F>))
    // Reads
    .route("/categories", get(query::categories::<S, F>))
    .route("/series", get(query::series::<S, F>))
    .route("/latest", get(query::latest::<S, F>))
    .route("/insights/nominal-vs-real", get(query::nominal_vs_real::<S, F>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
