//! Reader selection by file extension

use super::delimited::{CsvOptions, CsvReader};
use super::log::LogSink;
use super::source::{BatchError, Record, RecordSource, SourceFormat};
use super::structured::{JsonFile, JsonOptions, JsonReader};
use super::window::{BatchWindow, RawWindow};
use crate::config::Config;
use std::path::Path;
use std::sync::Arc;

/// A reader chosen by [`get_reader`]
pub enum FileReader {
    Csv(CsvReader),
    Json(JsonFile),
}

impl FileReader {
    pub fn format(&self) -> SourceFormat {
        match self {
            FileReader::Csv(_) => SourceFormat::Csv,
            FileReader::Json(_) => SourceFormat::Json,
        }
    }

    /// Apply JSON options; CSV readers are returned unchanged
    pub fn with_json_options(self, options: JsonOptions) -> Self {
        match self {
            FileReader::Json(file) => FileReader::Json(file.with_options(options)),
            other => other,
        }
    }
}

/// Pick a reader for `path` by its extension.
///
/// The file must exist; its content is never inspected.
pub fn get_reader(
    path: impl AsRef<Path>,
    config: &Config,
    sink: Arc<dyn LogSink>,
) -> Result<FileReader, BatchError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BatchError::NotFound(path.to_path_buf()));
    }

    match SourceFormat::detect(path) {
        Some(SourceFormat::Csv) => {
            let options = CsvOptions::try_from(&config.csv)?;
            Ok(FileReader::Csv(CsvReader::open(path, options)?))
        }
        Some(SourceFormat::Json) => {
            let reader = JsonReader::new(config.json.clone(), sink);
            Ok(FileReader::Json(JsonFile::new(path, reader)))
        }
        None => Err(BatchError::UnsupportedType(
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| path.display().to_string()),
        )),
    }
}

impl RecordSource for FileReader {
    fn records(
        &mut self,
        window: &BatchWindow,
    ) -> Box<dyn Iterator<Item = Result<Record, BatchError>> + '_> {
        match self {
            FileReader::Csv(reader) => reader.records(window),
            FileReader::Json(file) => file.records(window),
        }
    }

    fn resolve_window(&mut self, raw: &RawWindow) -> Result<BatchWindow, BatchError> {
        match self {
            FileReader::Csv(reader) => reader.resolve_window(raw),
            FileReader::Json(file) => file.resolve_window(raw),
        }
    }

    fn expected_records(&self, window: &BatchWindow) -> Option<u64> {
        match self {
            FileReader::Csv(reader) => reader.expected_records(window),
            FileReader::Json(file) => file.expected_records(window),
        }
    }

    fn default_start(&self) -> u64 {
        match self {
            FileReader::Csv(reader) => reader.default_start(),
            FileReader::Json(file) => file.default_start(),
        }
    }

    fn source_name(&self) -> &str {
        match self {
            FileReader::Csv(reader) => reader.source_name(),
            FileReader::Json(file) => file.source_name(),
        }
    }

    fn source_path(&self) -> &Path {
        match self {
            FileReader::Csv(reader) => reader.source_path(),
            FileReader::Json(file) => file.source_path(),
        }
    }
}
