//! Core types and traits for batched file iteration

use super::window::{BatchWindow, RawWindow};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single CSV data row, keyed by header name in header order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    /// Zip header names against values.
    ///
    /// Duplicate header names collapse onto the first occurrence's position and
    /// the last value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = IndexMap::new();
        for (k, v) in pairs {
            fields.insert(k.into(), v.into());
        }
        Self { fields }
    }

    /// Value for a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Column names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// (column, value) pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Payload of a record: a CSV row or a JSON element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordData {
    Row(Row),
    Element(Value),
}

/// A record produced by a [`RecordSource`], tagged with its offset in the file.
///
/// CSV offsets are 1-based data row numbers; JSON offsets are 0-based element
/// indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub offset: u64,
    pub data: RecordData,
}

impl Record {
    pub fn row(offset: u64, row: Row) -> Self {
        Self {
            offset,
            data: RecordData::Row(row),
        }
    }

    pub fn element(offset: u64, value: Value) -> Self {
        Self {
            offset,
            data: RecordData::Element(value),
        }
    }

    /// The payload as a JSON value. Rows become objects with keys in header
    /// order.
    pub fn to_json(&self) -> Value {
        match &self.data {
            RecordData::Row(row) => Value::Object(
                row.iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect::<serde_json::Map<_, _>>(),
            ),
            RecordData::Element(value) => value.clone(),
        }
    }
}

/// Trait for file readers that can be drained in batches
pub trait RecordSource {
    /// Iterate over the records inside `window`
    fn records(
        &mut self,
        window: &BatchWindow,
    ) -> Box<dyn Iterator<Item = Result<Record, BatchError>> + '_>;

    /// Resolve raw CLI bounds, counting the file when `end` is unbounded
    fn resolve_window(&mut self, raw: &RawWindow) -> Result<BatchWindow, BatchError>;

    /// Number of records `window` will produce, when known
    fn expected_records(&self, window: &BatchWindow) -> Option<u64> {
        window.total
    }

    /// First offset when the caller gives no start
    fn default_start(&self) -> u64;

    /// Source name for display
    fn source_name(&self) -> &str;

    /// Path recorded in checkpoints
    fn source_path(&self) -> &Path;
}

/// Input format, decided purely by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// Detect format from file path
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }
}

/// Settings for a [`BatchRunner`](super::runner::BatchRunner) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Checkpoint interval (records)
    pub checkpoint_interval: usize,
    /// Checkpoint file path
    pub checkpoint_path: Option<PathBuf>,
    /// Maximum records to hand to the handler (None = unlimited)
    pub max_records: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            checkpoint_path: None,
            max_records: None,
        }
    }
}

/// Run statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Records pulled from the reader
    pub records_processed: usize,
    /// Records the handler accepted
    pub records_succeeded: usize,
    /// Records the handler skipped
    pub records_skipped: usize,
    /// Records the handler failed on
    pub records_errored: usize,
    /// Offset after the last record pulled
    pub next_offset: Option<u64>,
    pub elapsed_seconds: f64,
    pub records_per_second: f64,
}

impl BatchStats {
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.records_per_second = self.records_processed as f64 / self.elapsed_seconds;
        }
    }
}

/// Checkpoint for resume support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    /// Source file path
    pub source_path: PathBuf,
    /// Offset of the first record not yet processed
    pub next_offset: u64,
    /// Records processed so far
    pub records_processed: usize,
    /// Records the handler failed on so far
    pub records_errored: usize,
    /// End of the window the run was started with
    pub window_end: Option<u64>,
    /// Timestamp of checkpoint
    pub timestamp: DateTime<Utc>,
}

impl BatchCheckpoint {
    pub fn new(
        source_path: PathBuf,
        next_offset: u64,
        window_end: Option<u64>,
        stats: &BatchStats,
    ) -> Self {
        Self {
            source_path,
            next_offset,
            records_processed: stats.records_processed,
            records_errored: stats.records_errored,
            window_end,
            timestamp: Utc::now(),
        }
    }

    /// Save checkpoint to file
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load checkpoint from file
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let json = std::fs::read_to_string(path)?;
        let checkpoint = serde_json::from_str(&json)?;
        Ok(checkpoint)
    }

    /// Window bounds that continue where this checkpoint stopped
    pub fn resume_window(&self) -> RawWindow {
        RawWindow {
            start: Some(self.next_offset.to_string()),
            end: self.window_end.map(|e| e.to_string()),
            num_items: None,
        }
    }
}

/// Errors that can occur while resolving or reading a batch
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid batch window: {0}")]
    Validation(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Malformed row {row}: expected {expected} columns, found {found}")]
    MalformedRow {
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("Source unreachable: {0}")]
    UnreachableSource(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Count error: {0}")]
    Count(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            SourceFormat::detect(Path::new("authors.csv")),
            Some(SourceFormat::Csv)
        );
        assert_eq!(
            SourceFormat::detect(Path::new("/data/listings.JSON")),
            Some(SourceFormat::Json)
        );
        assert_eq!(SourceFormat::detect(Path::new("posts.xml")), None);
        assert_eq!(SourceFormat::detect(Path::new("README")), None);
    }

    #[test]
    fn test_row_duplicate_headers_last_value_wins() {
        let row = Row::from_pairs(vec![("id", "1"), ("name", "a"), ("id", "2")]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some("2"));
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_record_to_json() {
        let row = Row::from_pairs(vec![("name", "Alice"), ("email", "alice@example.com")]);
        let record = Record::row(1, row);
        assert_eq!(
            record.to_json(),
            serde_json::json!({"name": "Alice", "email": "alice@example.com"})
        );
    }

    #[test]
    fn test_record_to_json_keeps_header_order() {
        let row = Row::from_pairs(vec![("zip", "10115"), ("city", "Berlin"), ("street", "Main")]);
        let json = Record::row(1, row).to_json();

        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zip", "city", "street"]);
        assert_eq!(
            json.to_string(),
            r#"{"zip":"10115","city":"Berlin","street":"Main"}"#
        );
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("run.checkpoint");

        let stats = BatchStats {
            records_processed: 42,
            records_errored: 1,
            ..Default::default()
        };
        let checkpoint = BatchCheckpoint::new(PathBuf::from("posts.csv"), 43, Some(100), &stats);
        checkpoint.save(&path).unwrap();

        let loaded = BatchCheckpoint::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);

        let raw = loaded.resume_window();
        assert_eq!(raw.start.as_deref(), Some("43"));
        assert_eq!(raw.end.as_deref(), Some("100"));
    }

    #[test]
    fn test_malformed_row_message() {
        let err = BatchError::MalformedRow {
            row: 3,
            expected: 2,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "Malformed row 3: expected 2 columns, found 3"
        );
    }
}
