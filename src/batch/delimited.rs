//! Delimited file reader
//!
//! Streams data rows from a CSV (or any single-character-delimited) file with
//! a mandatory header row. Rows are 1-indexed; row 0 is the header. A row
//! whose column count differs from the header's ends the stream with
//! [`BatchError::MalformedRow`].

use super::counter;
use super::encoding::TextEncoding;
use super::source::{BatchError, Record, RecordSource, Row};
use super::window::{BatchWindow, RawWindow};
use crate::config::CsvConfig;
use csv::{ByteRecord, Position, ReaderBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Byte-level parsing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub enclosure: u8,
    pub escape: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            enclosure: b'"',
            escape: b'\\',
        }
    }
}

impl TryFrom<&CsvConfig> for CsvOptions {
    type Error = BatchError;

    fn try_from(config: &CsvConfig) -> Result<Self, Self::Error> {
        let byte = |name: &str, ch: char| {
            u8::try_from(ch)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| BatchError::Validation(format!("csv {} must be ASCII", name)))
        };
        Ok(Self {
            delimiter: byte("delimiter", config.delimiter)?,
            enclosure: byte("enclosure", config.enclosure)?,
            escape: byte("escape", config.escape)?,
        })
    }
}

/// Reader over one delimited file
pub struct CsvReader {
    path: PathBuf,
    name: String,
    options: CsvOptions,
    encoding: TextEncoding,
    /// Opened on first read
    reader: Option<csv::Reader<File>>,
    min_start: u64,
    start: u64,
    /// Inclusive last row (None = end of file)
    end: Option<u64>,
}

impl CsvReader {
    /// Smallest data row number; row 0 is the header
    pub const MIN_START: u64 = 1;

    /// Open a delimited file. The handle itself is opened lazily.
    pub fn open(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self, BatchError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(BatchError::NotFound(path));
        }

        let encoding = TextEncoding::detect_file(&path);
        debug!("Detected {} encoding for {}", encoding, path.display());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path,
            name,
            options,
            encoding,
            reader: None,
            min_start: Self::MIN_START,
            start: Self::MIN_START,
            end: None,
        })
    }

    /// Override the minimum start row
    pub fn with_min_start(mut self, min_start: u64) -> Self {
        self.min_start = min_start;
        self.start = self.start.max(min_start);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn min_start(&self) -> u64 {
        self.min_start
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Set the first row to produce, clamped to [`min_start`](Self::min_start)
    pub fn set_start(&mut self, start: u64) {
        self.start = start.max(self.min_start);
    }

    /// Set the last row to produce (inclusive)
    pub fn set_end(&mut self, end: Option<u64>) {
        self.end = end;
    }

    /// Apply a resolved window
    pub fn bind(&mut self, window: &BatchWindow) {
        self.set_start(window.start);
        self.set_end(window.end);
    }

    fn builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.options.delimiter)
            .quote(self.options.enclosure)
            .escape(Some(self.options.escape))
            .has_headers(false)
            // Column counts are checked against the header here, not by csv
            .flexible(true);
        builder
    }

    fn handle(&mut self) -> Result<&mut csv::Reader<File>, BatchError> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => self.builder().from_path(&self.path)?,
        };
        Ok(self.reader.insert(reader))
    }

    /// Rewind to the start of the file and read the header row.
    ///
    /// Names are trimmed but not deduplicated.
    pub fn get_header(&mut self) -> Result<Vec<String>, BatchError> {
        let encoding = self.encoding;
        let reader = self.handle()?;
        reader.seek(Position::new())?;

        let mut record = ByteRecord::new();
        if !reader.read_byte_record(&mut record)? {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = record
            .iter()
            .map(|field| encoding.decode(field).trim().to_string())
            .collect();
        if let Some(first) = names.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.trim().to_string();
            }
        }
        Ok(names)
    }

    /// Lazily produce the rows inside the bound window
    pub fn produce_rows(&mut self) -> CsvRows<'_> {
        CsvRows {
            source: self,
            header: None,
            record: ByteRecord::new(),
            row: 0,
            done: false,
        }
    }

    /// Count data rows through an independent handle
    pub fn count_rows(&self) -> Result<u64, BatchError> {
        let mut reader = self.builder().from_path(&self.path)?;
        let mut record = ByteRecord::new();
        let mut records = 0u64;
        while reader.read_byte_record(&mut record)? {
            records += 1;
        }
        // First record is the header
        Ok(records.saturating_sub(1))
    }
}

/// Single-pass iterator over the rows of a [`CsvReader`]
pub struct CsvRows<'a> {
    source: &'a mut CsvReader,
    header: Option<Vec<String>>,
    record: ByteRecord,
    /// Last data row consumed from the file
    row: u64,
    done: bool,
}

impl CsvRows<'_> {
    /// Row number of the most recently produced row
    pub fn position(&self) -> u64 {
        self.row
    }

    fn advance(&mut self) -> Result<Option<Row>, BatchError> {
        if self.header.is_none() {
            let header = self.source.get_header()?;
            if header.is_empty() {
                return Ok(None);
            }
            warn_on_duplicates(&self.source.name, &header);
            self.header = Some(header);

            let start = self.source.start;
            while self.row + 1 < start {
                if !self.source.handle()?.read_byte_record(&mut self.record)? {
                    debug!("{} ended before start row {}", self.source.name, start);
                    return Ok(None);
                }
                self.row += 1;
            }
        }

        if let Some(end) = self.source.end {
            if self.row + 1 > end {
                return Ok(None);
            }
        }

        if !self.source.handle()?.read_byte_record(&mut self.record)? {
            return Ok(None);
        }
        self.row += 1;

        let header = match &self.header {
            Some(header) => header,
            None => return Ok(None),
        };
        if self.record.len() != header.len() {
            return Err(BatchError::MalformedRow {
                row: self.row,
                expected: header.len(),
                found: self.record.len(),
            });
        }

        let encoding = self.source.encoding;
        Ok(Some(Row::from_pairs(
            header
                .iter()
                .zip(self.record.iter())
                .map(|(name, value)| (name.clone(), encoding.decode(value).into_owned())),
        )))
    }
}

impl Iterator for CsvRows<'_> {
    type Item = Result<Row, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for CsvRows<'_> {}

fn warn_on_duplicates(source: &str, header: &[String]) {
    let mut seen = std::collections::HashSet::new();
    for name in header {
        if !seen.insert(name.as_str()) {
            warn!(
                "{}: duplicate column '{}', later values overwrite earlier ones",
                source, name
            );
        }
    }
}

impl RecordSource for CsvReader {
    fn records(
        &mut self,
        window: &BatchWindow,
    ) -> Box<dyn Iterator<Item = Result<Record, BatchError>> + '_> {
        self.bind(window);
        let mut rows = self.produce_rows();
        Box::new(std::iter::from_fn(move || {
            let item = rows.next()?;
            Some(item.map(|row| Record::row(rows.position(), row)))
        }))
    }

    fn resolve_window(&mut self, raw: &RawWindow) -> Result<BatchWindow, BatchError> {
        counter::resolve_csv_window(self, raw)
    }

    /// The end row is inclusive, so a bounded window holds one row more than
    /// its `total`. An unbounded total is `count - start` except at the
    /// minimum start, where it is the full count.
    fn expected_records(&self, window: &BatchWindow) -> Option<u64> {
        let start = window.start.max(self.min_start);
        match window.end {
            Some(end) if end < start => Some(0),
            Some(end) => Some(end - start + 1),
            None if start == self.min_start => window.total,
            None => window.total.map(|total| total + 1),
        }
    }

    fn default_start(&self) -> u64 {
        self.min_start
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &[u8]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_file() {
        match CsvReader::open("/nonexistent/authors.csv", CsvOptions::default()) {
            Err(BatchError::NotFound(path)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/authors.csv"))
            }
            _ => panic!("Expected BatchError::NotFound"),
        }
    }

    #[test]
    fn test_name_email_scenario() {
        let file = write_csv(b"name,email\nAlice,alice@example.com\nBob,bob@example.com\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        assert_eq!(reader.get_header().unwrap(), vec!["name", "email"]);

        let rows: Vec<Row> = reader.produce_rows().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Alice"));
        assert_eq!(rows[0].get("email"), Some("alice@example.com"));
        assert_eq!(rows[1].get("name"), Some("Bob"));
        assert_eq!(rows[1].get("email"), Some("bob@example.com"));
    }

    #[test]
    fn test_header_is_idempotent_and_trimmed() {
        let file = write_csv(b"\xef\xbb\xbf id , title ,body\n1,Hello,World\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        let first = reader.get_header().unwrap();
        let second = reader.get_header().unwrap();
        assert_eq!(first, vec!["id", "title", "body"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_window_is_inclusive() {
        let mut content = String::from("n\n");
        for i in 1..=10 {
            content.push_str(&format!("{}\n", i));
        }
        let file = write_csv(content.as_bytes());
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        reader.set_start(3);
        reader.set_end(Some(5));
        let values: Vec<String> = reader
            .produce_rows()
            .map(|r| r.unwrap().get("n").unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["3", "4", "5"]);
    }

    #[test]
    fn test_start_clamped_to_first_data_row() {
        let file = write_csv(b"a\nx\ny\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        reader.set_start(0);
        assert_eq!(reader.start(), 1);
        assert_eq!(reader.produce_rows().count(), 2);
    }

    #[test]
    fn test_start_past_eof_yields_nothing() {
        let file = write_csv(b"a\nx\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        reader.set_start(5);
        assert_eq!(reader.produce_rows().count(), 0);
    }

    #[test]
    fn test_column_mismatch_is_fatal() {
        let file = write_csv(b"a,b\n1,2,3\n4,5\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        let mut rows = reader.produce_rows();
        match rows.next() {
            Some(Err(BatchError::MalformedRow { row, expected, found })) => {
                assert_eq!((row, expected, found), (1, 2, 3));
            }
            other => panic!("Expected MalformedRow, got {other:?}"),
        }
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_short_row_stops_after_good_rows() {
        let file = write_csv(b"a,b\n1,2\n3\n5,6\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        let results: Vec<_> = reader.produce_rows().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(BatchError::MalformedRow { row: 2, .. })
        ));
    }

    #[test]
    fn test_custom_delimiter_and_enclosure() {
        let file = write_csv(b"title;tags\n'Hello; world';'a,b'\n");
        let options = CsvOptions {
            delimiter: b';',
            enclosure: b'\'',
            escape: b'\\',
        };
        let mut reader = CsvReader::open(file.path(), options).unwrap();
        let row = reader.produce_rows().next().unwrap().unwrap();
        assert_eq!(row.get("title"), Some("Hello; world"));
        assert_eq!(row.get("tags"), Some("a,b"));
    }

    #[test]
    fn test_latin1_values_are_normalized() {
        let file = write_csv(b"name,city\nJos\xe9,M\xfcnchen\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        assert_eq!(reader.encoding(), TextEncoding::Latin1);

        let row = reader.produce_rows().next().unwrap().unwrap();
        assert_eq!(row.get("name"), Some("José"));
        assert_eq!(row.get("city"), Some("München"));
    }

    #[test]
    fn test_windows_1252_punctuation() {
        let file = write_csv(b"name\n\x93Caf\xe9\x94 \x96 \x80\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        let row = reader.produce_rows().next().unwrap().unwrap();
        assert_eq!(row.get("name"), Some("\u{201C}Café\u{201D} \u{2013} \u{20AC}"));
    }

    #[test]
    fn test_latin1_row_past_detection_sample() {
        let mut content = b"id,name\n".to_vec();
        let mut i = 0;
        while content.len() < 70 * 1024 {
            content.extend_from_slice(format!("{},plain ascii name\n", i).as_bytes());
            i += 1;
        }
        content.extend_from_slice(b"last,Jos\xe9\n");
        let file = write_csv(&content);

        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        assert_eq!(reader.encoding(), TextEncoding::Utf8);

        let last = reader.produce_rows().last().unwrap().unwrap();
        assert_eq!(last.get("id"), Some("last"));
        assert_eq!(last.get("name"), Some("José"));
    }

    #[test]
    fn test_expected_records_counts_inclusive_end() {
        let file = write_csv(b"a\n1\n2\n3\n4\n5\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();

        let window = reader
            .resolve_window(&RawWindow::new().with_start(2).with_end(4))
            .unwrap();
        assert_eq!(window.total, Some(2));
        assert_eq!(reader.expected_records(&window), Some(3));
        assert_eq!(reader.records(&window).count(), 3);

        let window = reader.resolve_window(&RawWindow::new()).unwrap();
        assert_eq!(reader.expected_records(&window), Some(5));
        assert_eq!(reader.records(&window).count(), 5);

        let window = reader
            .resolve_window(&RawWindow::new().with_start(3))
            .unwrap();
        assert_eq!(reader.expected_records(&window), Some(3));
        assert_eq!(reader.records(&window).count(), 3);
    }

    #[test]
    fn test_count_rows() {
        let file = write_csv(b"a,b\n1,2\n3,4\n5,6\n");
        let reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        assert_eq!(reader.count_rows().unwrap(), 3);

        let empty = write_csv(b"");
        let reader = CsvReader::open(empty.path(), CsvOptions::default()).unwrap();
        assert_eq!(reader.count_rows().unwrap(), 0);
    }

    #[test]
    fn test_records_carry_row_numbers() {
        let file = write_csv(b"a\nx\ny\nz\n");
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let window = BatchWindow::new(2, None).unwrap();
        let offsets: Vec<u64> = reader
            .records(&window)
            .map(|r| r.unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![2, 3]);
    }

    #[test]
    fn test_options_from_config() {
        let config = CsvConfig {
            delimiter: '\t',
            ..CsvConfig::default()
        };
        let options = CsvOptions::try_from(&config).unwrap();
        assert_eq!(options.delimiter, b'\t');

        let bad = CsvConfig {
            delimiter: 'é',
            ..CsvConfig::default()
        };
        assert!(matches!(
            CsvOptions::try_from(&bad),
            Err(BatchError::Validation(_))
        ));
    }
}
