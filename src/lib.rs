//! batchfeed: batched, resumable iteration over CSV and JSON files
//!
//! Feeds large flat files to downstream batch jobs one record at a time:
//! - Windowed reads (`start`, `end`, `num_items`) with explicit validation
//! - Header-keyed CSV rows with encoding normalization
//! - Streaming JSON arrays, local or remote, with pointer selection
//! - Batch totals via row counting or an external `jq`-style counter
//! - Checkpointed runs that resume where they stopped

pub mod batch;
pub mod config;

pub use batch::{BatchError, BatchWindow, RawWindow, Record, RecordSource};
pub use config::Config;
