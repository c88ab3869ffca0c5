//! JSON reader
//!
//! Streams the elements of a JSON array from a local file or an HTTP(S) URL.
//! Missing sources and malformed documents are not fatal: they are reported
//! through the injected [`LogSink`] and the sequence simply ends.

use super::counter;
use super::json_stream::{ArrayStream, JsonPointer};
use super::log::LogSink;
use super::source::{BatchError, Record, RecordSource};
use super::window::{BatchWindow, RawWindow};
use crate::config::{JsonConfig, LogLevel};
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

type Input = Box<dyn BufRead + Send>;

/// Per-call JSON options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonOptions {
    /// JSON pointer to the array to iterate (None = document root)
    pub pointer: Option<String>,
}

impl JsonOptions {
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    fn json_pointer(&self) -> Result<JsonPointer, BatchError> {
        match &self.pointer {
            Some(pointer) => JsonPointer::parse(pointer),
            None => Ok(JsonPointer::root()),
        }
    }
}

/// Stateless JSON reader; every call names its own source
#[derive(Clone)]
pub struct JsonReader {
    config: JsonConfig,
    sink: Arc<dyn LogSink>,
}

impl JsonReader {
    pub fn new(config: JsonConfig, sink: Arc<dyn LogSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &JsonConfig {
        &self.config
    }

    /// Lazily iterate the elements at `options.pointer` in `source`.
    ///
    /// Never fails: an unreachable or unparseable source is logged and
    /// produces an empty sequence.
    pub fn items(&self, source: &str, options: &JsonOptions) -> JsonItems {
        let pointer = match options.json_pointer() {
            Ok(pointer) => pointer,
            Err(e) => {
                self.sink
                    .log(LogLevel::Error, &format!("Invalid pointer for {}: {}", source, e));
                return JsonItems::empty(source, self.sink.clone());
            }
        };

        match self.open_source(source) {
            Ok(input) => {
                debug!("Streaming JSON from {}", source);
                JsonItems {
                    source: source.to_string(),
                    stream: Some(ArrayStream::new(input, pointer)),
                    sink: self.sink.clone(),
                    position: 0,
                }
            }
            Err(e) => {
                self.sink.log(LogLevel::Error, &e.to_string());
                JsonItems::empty(source, self.sink.clone())
            }
        }
    }

    /// [`items`](Self::items) restricted to offsets `start..end`
    pub fn batched_items(
        &self,
        source: &str,
        start: u64,
        end: Option<u64>,
        options: &JsonOptions,
    ) -> BatchedItems {
        BatchedItems {
            items: self.items(source, options),
            start,
            end,
        }
    }

    /// Count the entries at `options.pointer` with the external counter program
    pub fn count_array_entries(
        &self,
        path: &Path,
        options: &JsonOptions,
    ) -> Result<u64, BatchError> {
        if !path.exists() {
            return Err(BatchError::Count(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let pointer = options.json_pointer()?;
        let filter = if pointer.is_empty() {
            "length".to_string()
        } else {
            format!("[{} | length] | add // 0", pointer.to_jq_path())
        };

        let program = &self.config.count_program;
        debug!("Counting {} with {} '{}'", path.display(), program, filter);
        let output = Command::new(program)
            .arg(&filter)
            .arg(path)
            .output()
            .map_err(|e| BatchError::Count(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(BatchError::Count(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<u64>().map_err(|_| {
            BatchError::Count(format!(
                "{} produced no usable count: '{}'",
                program,
                stdout.trim()
            ))
        })
    }

    /// Resolve raw bounds, counting the file when `end` is unbounded
    pub fn validate_and_resolve_batch(
        &self,
        path: &Path,
        raw: &RawWindow,
        options: &JsonOptions,
    ) -> Result<BatchWindow, BatchError> {
        counter::resolve_json_window(self, path, raw, options)
    }

    fn open_source(&self, source: &str) -> Result<Input, BatchError> {
        if is_remote(source) {
            return self.open_remote(source);
        }

        let path = Path::new(source);
        if !path.exists() {
            return Err(BatchError::UnreachableSource(format!(
                "{} does not exist",
                source
            )));
        }
        let file = File::open(path)?;
        Ok(Box::new(BufReader::with_capacity(1024 * 1024, file)))
    }

    fn open_remote(&self, url: &str) -> Result<Input, BatchError> {
        let probe_timeout = Duration::from_secs(self.config.probe_timeout_secs);
        // The body of a large feed may take longer than the probe timeout to stream
        let client = Client::builder()
            .connect_timeout(probe_timeout)
            .timeout(None::<Duration>)
            .user_agent(self.config.user_agent.clone())
            .build()?;

        let probe = client
            .head(url)
            .timeout(probe_timeout)
            .send()
            .map_err(|e| BatchError::UnreachableSource(format!("{}: {}", url, e)))?;
        if !probe.status().is_success() {
            return Err(BatchError::UnreachableSource(format!(
                "{} returned {}",
                url,
                probe.status()
            )));
        }

        let response = client.get(url).send()?.error_for_status()?;
        info!("Streaming remote JSON from {}", url);
        Ok(Box::new(BufReader::with_capacity(1024 * 1024, response)))
    }
}

fn is_remote(source: &str) -> bool {
    Url::parse(source)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Forward-only sequence of JSON elements.
///
/// Parse failures are logged once and end the sequence. The underlying handle
/// is released as soon as the sequence ends.
pub struct JsonItems {
    source: String,
    stream: Option<ArrayStream<Input>>,
    sink: Arc<dyn LogSink>,
    position: u64,
}

impl JsonItems {
    fn empty(source: &str, sink: Arc<dyn LogSink>) -> Self {
        Self {
            source: source.to_string(),
            stream: None,
            sink,
            position: 0,
        }
    }

    /// Offset of the next element
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Release the underlying handle; no further elements are produced
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl Iterator for JsonItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let stream = self.stream.as_mut()?;
        match stream.next() {
            Some(Ok(value)) => {
                self.position += 1;
                Some(value)
            }
            Some(Err(e)) => {
                self.sink.log(
                    LogLevel::Error,
                    &format!("Failed to parse {}: {}", self.source, e),
                );
                self.close();
                None
            }
            None => {
                self.close();
                None
            }
        }
    }
}

impl std::iter::FusedIterator for JsonItems {}

/// Elements of a [`JsonItems`] sequence within `start..end`
pub struct BatchedItems {
    items: JsonItems,
    start: u64,
    end: Option<u64>,
}

impl BatchedItems {
    /// Next element together with its offset
    pub fn next_indexed(&mut self) -> Option<(u64, Value)> {
        loop {
            let offset = self.items.position();
            if self.end.is_some_and(|end| offset >= end) {
                self.items.close();
                return None;
            }
            let value = self.items.next()?;
            if offset >= self.start {
                return Some((offset, value));
            }
        }
    }
}

impl Iterator for BatchedItems {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.next_indexed().map(|(_, value)| value)
    }
}

/// A JSON file bound to a reader, for use through [`RecordSource`]
pub struct JsonFile {
    path: PathBuf,
    name: String,
    reader: JsonReader,
    options: JsonOptions,
}

impl JsonFile {
    pub fn new(path: impl AsRef<Path>, reader: JsonReader) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            name,
            reader,
            options: JsonOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JsonOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reader(&self) -> &JsonReader {
        &self.reader
    }
}

impl RecordSource for JsonFile {
    fn records(
        &mut self,
        window: &BatchWindow,
    ) -> Box<dyn Iterator<Item = Result<Record, BatchError>> + '_> {
        let source = self.path.to_string_lossy().into_owned();
        let mut batch = self
            .reader
            .batched_items(&source, window.start, window.end, &self.options);
        Box::new(std::iter::from_fn(move || {
            batch
                .next_indexed()
                .map(|(offset, value)| Ok(Record::element(offset, value)))
        }))
    }

    fn resolve_window(&mut self, raw: &RawWindow) -> Result<BatchWindow, BatchError> {
        self.reader
            .validate_and_resolve_batch(&self.path, raw, &self.options)
    }

    fn default_start(&self) -> u64 {
        0
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_path(&self) -> &Path {
        &self.path
    }
}
