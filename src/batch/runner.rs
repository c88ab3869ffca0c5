//! Batch runner that drains a record source through a handler

use super::progress::{BatchProgress, RecordOutcome};
use super::source::{BatchCheckpoint, BatchError, BatchStats, Record, RecordSource, RunConfig};
use super::window::BatchWindow;
use std::path::Path;
use tracing::{debug, info, warn};

/// Error type handlers may return; failures are counted, not fatal
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Drives one window of a [`RecordSource`] through a record handler
pub struct BatchRunner {
    config: RunConfig,
    quiet: bool,
}

impl BatchRunner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            quiet: false,
        }
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `handler` over every record of `window`.
    ///
    /// A handler error is logged and counted and the run moves on. A reader
    /// error ends the run and is returned; the final checkpoint still points
    /// at the first record that was not handled.
    pub fn run<S, F>(
        &self,
        source: &mut S,
        window: &BatchWindow,
        mut handler: F,
    ) -> Result<BatchStats, BatchError>
    where
        S: RecordSource + ?Sized,
        F: FnMut(Record) -> Result<RecordOutcome, HandlerError>,
    {
        let source_name = source.source_name().to_string();
        info!(
            "Starting batch from: {} (start {}, end {:?})",
            source_name, window.start, window.end
        );

        let progress = BatchProgress::new(
            source.source_path().to_path_buf(),
            window,
            self.config.checkpoint_interval,
            self.config.checkpoint_path.clone(),
            self.quiet,
        );
        if let Some(expected) = source.expected_records(window) {
            let expected = match self.config.max_records {
                Some(max) => expected.min(max as u64),
                None => expected,
            };
            progress.set_expected(expected);
        }

        let mut handed = 0usize;
        let mut records = source.records(window);

        loop {
            if let Some(max) = self.config.max_records {
                if handed >= max {
                    info!("Reached max records limit: {}", max);
                    break;
                }
            }

            let record = match records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    warn!("Error reading {}: {}", source_name, e);
                    progress.abandon(&e.to_string());
                    return Err(e);
                }
                None => break,
            };

            handed += 1;
            let offset = record.offset;
            match handler(record) {
                Ok(outcome) => {
                    if outcome == RecordOutcome::Skipped {
                        debug!("Skipped record {} of {}", offset, source_name);
                    }
                    progress.record_handled(offset, outcome);
                }
                Err(e) => {
                    warn!("Error handling record {} of {}: {}", offset, source_name, e);
                    progress.record_error(offset);
                }
            }
        }

        progress.finish();
        if !self.quiet {
            progress.print_summary();
        }

        let stats = progress.get_stats();
        info!(
            "Finished batch from {}: {} records, next offset {}",
            source_name,
            stats.records_processed,
            progress.next_offset()
        );
        Ok(stats)
    }

    /// Resume a run from a checkpoint.
    ///
    /// The window restarts at the checkpoint's `next_offset` and keeps its
    /// original end.
    pub fn resume<S, F>(
        &self,
        source: &mut S,
        checkpoint: &BatchCheckpoint,
        handler: F,
    ) -> Result<BatchStats, BatchError>
    where
        S: RecordSource + ?Sized,
        F: FnMut(Record) -> Result<RecordOutcome, HandlerError>,
    {
        info!(
            "Resuming batch from checkpoint: {} records, next offset {}",
            checkpoint.records_processed, checkpoint.next_offset
        );

        let window = source.resolve_window(&checkpoint.resume_window())?;
        self.run(source, &window, handler)
    }
}

/// Builder for BatchRunner with sensible defaults
pub struct BatchRunnerBuilder {
    config: RunConfig,
    quiet: bool,
}

impl Default for BatchRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            quiet: false,
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set checkpoint interval (records)
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    pub fn with_checkpoint(mut self, path: impl AsRef<Path>) -> Self {
        self.config.checkpoint_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set maximum records to hand to the handler
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.config.max_records = max_records;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the runner
    pub fn build(self) -> Result<BatchRunner, BatchError> {
        if self.config.checkpoint_interval == 0 {
            return Err(BatchError::Validation(
                "checkpoint interval must be greater than 0".into(),
            ));
        }
        Ok(BatchRunner::new(self.config).with_quiet(self.quiet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::delimited::{CsvOptions, CsvReader};
    use crate::batch::window::RawWindow;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn posts_csv(rows: usize) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,title").unwrap();
        for i in 1..=rows {
            writeln!(file, "{},Post {}", i, i).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn quiet_runner() -> BatchRunner {
        BatchRunnerBuilder::new().with_quiet(true).build().unwrap()
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = BatchRunnerBuilder::new()
            .with_checkpoint_interval(0)
            .with_quiet(true)
            .build();
        match result {
            Err(BatchError::Validation(_)) => (),
            _ => panic!("Expected BatchError::Validation"),
        }
    }

    #[test]
    fn test_run_counts_outcomes() {
        let file = posts_csv(6);
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let window = reader.resolve_window(&RawWindow::new()).unwrap();

        let mut seen = Vec::new();
        let stats = quiet_runner()
            .run(&mut reader, &window, |record| {
                let id = record.to_json()["id"].as_str().unwrap_or_default().to_string();
                seen.push(record.offset);
                match id.as_str() {
                    "2" => Ok(RecordOutcome::Skipped),
                    "4" => Err("rejected".into()),
                    _ => Ok(RecordOutcome::Processed),
                }
            })
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(stats.records_processed, 6);
        assert_eq!(stats.records_succeeded, 4);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.records_errored, 1);
        assert_eq!(stats.next_offset, Some(7));
    }

    #[test]
    fn test_run_honours_max_records() {
        let file = posts_csv(10);
        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let window = BatchWindow::unbounded(1);
        let runner = BatchRunnerBuilder::new()
            .with_max_records(Some(3))
            .with_quiet(true)
            .build()
            .unwrap();

        let stats = runner
            .run(&mut reader, &window, |_| Ok(RecordOutcome::Processed))
            .unwrap();
        assert_eq!(stats.records_processed, 3);
        assert_eq!(stats.next_offset, Some(4));
    }

    #[test]
    fn test_reader_error_aborts_run() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "a,b\n1,2\n3,4,5\n6,7\n").unwrap();
        file.flush().unwrap();

        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let mut handled = 0;
        let result = quiet_runner().run(&mut reader, &BatchWindow::unbounded(1), |_| {
            handled += 1;
            Ok(RecordOutcome::Processed)
        });

        assert!(matches!(result, Err(BatchError::MalformedRow { .. })));
        assert_eq!(handled, 1);
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let dir = TempDir::new().unwrap();
        let checkpoint_path = dir.path().join("posts.csv.checkpoint");
        let file = posts_csv(8);

        let runner = BatchRunnerBuilder::new()
            .with_checkpoint(&checkpoint_path)
            .with_max_records(Some(5))
            .with_quiet(true)
            .build()
            .unwrap();

        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let window = reader.resolve_window(&RawWindow::new()).unwrap();
        runner
            .run(&mut reader, &window, |_| Ok(RecordOutcome::Processed))
            .unwrap();

        let checkpoint = BatchCheckpoint::load(&checkpoint_path).unwrap();
        assert_eq!(checkpoint.next_offset, 6);
        assert_eq!(checkpoint.source_path, file.path());

        let mut reader = CsvReader::open(file.path(), CsvOptions::default()).unwrap();
        let mut offsets = Vec::new();
        quiet_runner()
            .resume(&mut reader, &checkpoint, |record| {
                offsets.push(record.offset);
                Ok(RecordOutcome::Processed)
            })
            .unwrap();
        assert_eq!(offsets, vec![6, 7, 8]);
    }
}
