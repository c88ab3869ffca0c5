//! Batched, resumable iteration over CSV and JSON files
//!
//! Readers expose a file as an ordered sequence of records, restricted to a
//! window of positions so that large files can be processed in independent
//! chunks. Each record is pulled lazily; nothing beyond the current record is
//! buffered.
//!
//! # Supported Formats
//!
//! - **Delimited text** (`.csv`): header row required, rows become ordered
//!   column → value maps. Row numbers start at 1; the header is row 0.
//! - **JSON** (`.json`): a top-level array (or the array/object selected by a
//!   JSON pointer) is streamed element by element. Offsets start at 0.
//!
//! # Example Usage
//!
//! ```no_run
//! use batchfeed::batch::{get_reader, BatchRunnerBuilder, RawWindow, RecordOutcome, RecordSource, TracingSink};
//! use batchfeed::config::Config;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut reader = get_reader("authors.csv", &config, Arc::new(TracingSink))?;
//!
//! // Rows 101..=200
//! let window = reader.resolve_window(&RawWindow::new().with_start(101).with_num_items(99))?;
//!
//! let runner = BatchRunnerBuilder::new().with_quiet(true).build()?;
//! let stats = runner.run(&mut reader, &window, |record| {
//!     println!("{}", record.to_json());
//!     Ok(RecordOutcome::Processed)
//! })?;
//! println!("Handled {} records", stats.records_processed);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            BatchRunner                              │
//! │                 (handler calls, progress, checkpoints)              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        RecordSource Trait                           │
//! │     fn records(&BatchWindow) -> impl Iterator<Result<Record>>       │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                                                 │
//!          ▼                                                 ▼
//! ┌─────────────────────────┐                 ┌─────────────────────────┐
//! │        CsvReader        │                 │        JsonFile         │
//! │                         │                 │                         │
//! │ - csv tokenizer         │                 │ - pull scanner          │
//! │ - header + row window   │                 │ - JSON pointer          │
//! │ - encoding normalize    │                 │ - jq-style counting     │
//! └─────────────────────────┘                 └─────────────────────────┘
//!          │                                                 │
//!          └────────────────────────┬────────────────────────┘
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              BatchWindow resolution + total counting                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod counter;
pub mod delimited;
pub mod encoding;
pub mod factory;
pub mod json_stream;
pub mod log;
pub mod progress;
pub mod runner;
pub mod source;
pub mod structured;
pub mod window;

// Re-export main types
pub use counter::{resolve_csv_window, resolve_json_window};
pub use delimited::{CsvOptions, CsvReader, CsvRows};
pub use encoding::TextEncoding;
pub use factory::{get_reader, FileReader};
pub use json_stream::{ArrayStream, JsonPointer};
pub use log::{FileLogSink, LogSink, TracingSink};
pub use progress::{BatchProgress, RecordOutcome};
pub use runner::{BatchRunner, BatchRunnerBuilder, HandlerError};
pub use source::{
    BatchCheckpoint, BatchError, BatchStats, Record, RecordData, RecordSource, Row, RunConfig,
    SourceFormat,
};
pub use structured::{BatchedItems, JsonFile, JsonItems, JsonOptions, JsonReader};
pub use window::{BatchWindow, RawWindow};
