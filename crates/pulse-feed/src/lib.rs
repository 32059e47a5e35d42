//! CSV codec for the Statistik Austria trade-index feed.
//!
//! Converts the wide, metric-per-column source file into strongly-typed
//! [`RawRecord`]s. Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::Utc;
//! use pulse_feed::parse_feed;
//!
//! let csv = "C-TI-0;C-NACEIDX-0;F-UIDXNOM;F-UIDXREAL;F-BESCHIDX\n\
//!            TIIDX-202101;NACEIDX-G47;96,1;94,0;99,2\n";
//! let feed = parse_feed(csv, Utc::now()).unwrap();
//! println!("{} records, {} bad rows", feed.records.len(), feed.row_errors.len());
//! ```

pub mod error;
mod parse;

pub use error::{Error, Result};
pub use parse::{ParsedFeed, parse_feed};
