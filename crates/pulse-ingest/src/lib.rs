//! Ingestion for trade-pulse: fetch the feed, parse it with `pulse-feed`,
//! normalize it with `pulse-core`, and write the batch to a
//! [`TradeStore`](pulse_core::store::TradeStore) in one transaction.

mod pipeline;
pub mod source;

pub use pipeline::Pipeline;
pub use source::{FeedSource, HttpSource, SourceConfig};
