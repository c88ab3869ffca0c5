//! Progress tracking for batch runs

use super::source::{BatchCheckpoint, BatchError, BatchStats};
use super::window::BatchWindow;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Minimum time between two interval checkpoints
const CHECKPOINT_THROTTLE: Duration = Duration::from_secs(30);

/// How the handler dealt with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed,
    Skipped,
}

/// Progress tracker for a single batch run
pub struct BatchProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    records_processed: AtomicUsize,
    records_succeeded: AtomicUsize,
    records_skipped: AtomicUsize,
    records_errored: AtomicUsize,
    /// Offset of the first record not yet pulled
    next_offset: AtomicU64,
    /// End of the window being run, carried into checkpoints
    window_end: Option<u64>,
    last_checkpoint: Mutex<Instant>,
    checkpoint_interval: usize,
    checkpoint_path: Option<PathBuf>,
    source_path: PathBuf,
}

impl BatchProgress {
    pub fn new(
        source_path: PathBuf,
        window: &BatchWindow,
        checkpoint_interval: usize,
        checkpoint_path: Option<PathBuf>,
        quiet: bool,
    ) -> Self {
        let progress_bar = if !quiet {
            let pb = match window.total {
                Some(total) => ProgressBar::new(total),
                None => ProgressBar::new_spinner(),
            };

            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );

            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            records_processed: AtomicUsize::new(0),
            records_succeeded: AtomicUsize::new(0),
            records_skipped: AtomicUsize::new(0),
            records_errored: AtomicUsize::new(0),
            next_offset: AtomicU64::new(window.start),
            window_end: window.end,
            last_checkpoint: Mutex::new(Instant::now()),
            checkpoint_interval,
            checkpoint_path,
            source_path,
        }
    }

    /// Resize the bar to the number of records the run will pull
    pub fn set_expected(&self, expected: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_length(expected);
        }
    }

    /// Bar length; None when quiet or while the total is unknown
    pub fn expected(&self) -> Option<u64> {
        self.progress_bar.as_ref().and_then(|pb| pb.length())
    }

    /// Update progress after the handler returned for the record at `offset`
    pub fn record_handled(&self, offset: u64, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Processed => self.records_succeeded.fetch_add(1, Ordering::Relaxed),
            RecordOutcome::Skipped => self.records_skipped.fetch_add(1, Ordering::Relaxed),
        };
        self.advance(offset);
    }

    /// Record a handler failure for the record at `offset`
    pub fn record_error(&self, offset: u64) {
        self.records_errored.fetch_add(1, Ordering::Relaxed);
        self.advance(offset);
    }

    fn advance(&self, offset: u64) {
        let processed = self.records_processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.next_offset.store(offset + 1, Ordering::Relaxed);

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(processed as u64);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                processed as f64 / elapsed
            } else {
                0.0
            };
            pb.set_message(format!("{:.1} rec/s | offset {}", rate, offset));
        }

        if self.checkpoint_interval > 0 && processed % self.checkpoint_interval == 0 {
            self.maybe_checkpoint();
        }
    }

    fn maybe_checkpoint(&self) {
        if self.checkpoint_path.is_none() {
            return;
        }
        let mut last = self.last_checkpoint.lock();
        if last.elapsed() >= CHECKPOINT_THROTTLE {
            if let Err(e) = self.save_checkpoint() {
                tracing::warn!("Failed to save checkpoint: {}", e);
            }
            *last = Instant::now();
        }
    }

    /// Write a checkpoint now, if a checkpoint path is configured
    pub fn save_checkpoint(&self) -> Result<(), BatchError> {
        let Some(ref path) = self.checkpoint_path else {
            return Ok(());
        };
        let checkpoint = BatchCheckpoint::new(
            self.source_path.clone(),
            self.next_offset(),
            self.window_end,
            &self.get_stats(),
        );
        checkpoint.save(path)?;
        tracing::debug!(
            "Saved checkpoint at offset {} to {}",
            checkpoint.next_offset,
            path.display()
        );
        Ok(())
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset.load(Ordering::Relaxed)
    }

    pub fn get_stats(&self) -> BatchStats {
        let mut stats = BatchStats {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_succeeded: self.records_succeeded.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            records_errored: self.records_errored.load(Ordering::Relaxed),
            next_offset: Some(self.next_offset()),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            records_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    /// Stop the bar after a reader failure
    pub fn abandon(&self, reason: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("Failed: {}", reason));
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} processed, {} skipped, {} errors, {:.1} rec/s",
                stats.records_succeeded,
                stats.records_skipped,
                stats.records_errored,
                stats.records_per_second
            ));
        }
    }

    /// Print summary to stderr (stdout carries the records)
    pub fn print_summary(&self) {
        let stats = self.get_stats();

        eprintln!("\nBatch Summary");
        eprintln!("=============");
        eprintln!("Source:            {}", self.source_path.display());
        eprintln!("Records pulled:    {}", stats.records_processed);
        eprintln!("Records processed: {}", stats.records_succeeded);
        eprintln!("Records skipped:   {}", stats.records_skipped);
        eprintln!("Records errored:   {}", stats.records_errored);
        eprintln!("Next offset:       {}", self.next_offset());
        eprintln!("Elapsed time:      {:.1}s", stats.elapsed_seconds);
        eprintln!("Processing rate:   {:.1} rec/s", stats.records_per_second);
    }
}

impl Drop for BatchProgress {
    fn drop(&mut self) {
        if let Err(e) = self.save_checkpoint() {
            eprintln!("Warning: failed to save final batch checkpoint: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_progress_tracking() {
        let window = BatchWindow::new(10, Some(20)).unwrap();
        let progress = BatchProgress::new(PathBuf::from("posts.csv"), &window, 100, None, true);
        assert_eq!(progress.next_offset(), 10);

        progress.record_handled(10, RecordOutcome::Processed);
        progress.record_handled(11, RecordOutcome::Skipped);
        progress.record_error(12);

        let stats = progress.get_stats();
        assert_eq!(stats.records_processed, 3);
        assert_eq!(stats.records_succeeded, 1);
        assert_eq!(stats.records_skipped, 1);
        assert_eq!(stats.records_errored, 1);
        assert_eq!(stats.next_offset, Some(13));
    }

    #[test]
    fn test_bar_length_follows_expected_records() {
        let window = BatchWindow::new(1, Some(10)).unwrap();
        let progress = BatchProgress::new(PathBuf::from("authors.csv"), &window, 100, None, false);
        assert_eq!(progress.expected(), Some(9));

        progress.set_expected(10);
        assert_eq!(progress.expected(), Some(10));

        let quiet = BatchProgress::new(PathBuf::from("authors.csv"), &window, 100, None, true);
        quiet.set_expected(10);
        assert_eq!(quiet.expected(), None);
    }

    #[test]
    fn test_final_checkpoint_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cp").join("listings.json.checkpoint");
        let window = BatchWindow::new(0, Some(50)).unwrap();

        {
            let progress = BatchProgress::new(
                PathBuf::from("listings.json"),
                &window,
                1000,
                Some(path.clone()),
                true,
            );
            for offset in 0..7 {
                progress.record_handled(offset, RecordOutcome::Processed);
            }
        }

        let checkpoint = BatchCheckpoint::load(&path).unwrap();
        assert_eq!(checkpoint.source_path, Path::new("listings.json"));
        assert_eq!(checkpoint.next_offset, 7);
        assert_eq!(checkpoint.records_processed, 7);
        assert_eq!(checkpoint.window_end, Some(50));
    }

    #[test]
    fn test_interval_checkpoint_is_throttled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("authors.csv.checkpoint");
        let window = BatchWindow::unbounded(1);
        let progress =
            BatchProgress::new(PathBuf::from("authors.csv"), &window, 2, Some(path.clone()), true);

        // Interval reached, but the 30s throttle has not elapsed yet
        progress.record_handled(1, RecordOutcome::Processed);
        progress.record_handled(2, RecordOutcome::Processed);
        assert!(!path.exists());

        drop(progress);
        assert_eq!(BatchCheckpoint::load(&path).unwrap().next_offset, 3);
    }
}
