//! Batch totals
//!
//! A window with an explicit `end` is trusted as-is. An unbounded window gets
//! its `total` from a full count of the file, less `start`. CSV and JSON use
//! different "implicit start" sentinels for that subtraction (1 and 0), and
//! the two paths are kept separate.

use super::delimited::CsvReader;
use super::source::BatchError;
use super::structured::{JsonOptions, JsonReader};
use super::window::{BatchWindow, RawWindow};
use std::path::Path;
use tracing::debug;

/// CSV start value for which no subtraction happens
const CSV_IMPLICIT_START: u64 = 1;
/// JSON start value for which no subtraction happens
const JSON_IMPLICIT_START: u64 = 0;

/// Resolve a CSV window, counting rows when `end` is unbounded
pub fn resolve_csv_window(
    reader: &mut CsvReader,
    raw: &RawWindow,
) -> Result<BatchWindow, BatchError> {
    let window = raw.resolve(reader.min_start())?;
    let window = BatchWindow::new(window.start.max(reader.min_start()), window.end)?;
    reader.bind(&window);
    fill_total(window, CSV_IMPLICIT_START, || reader.count_rows())
}

/// Resolve a JSON window, counting entries when `end` is unbounded
pub fn resolve_json_window(
    reader: &JsonReader,
    path: &Path,
    raw: &RawWindow,
    options: &JsonOptions,
) -> Result<BatchWindow, BatchError> {
    let window = raw.resolve(JSON_IMPLICIT_START)?;
    fill_total(window, JSON_IMPLICIT_START, || {
        reader.count_array_entries(path, options)
    })
}

fn fill_total<F>(window: BatchWindow, implicit_start: u64, count: F) -> Result<BatchWindow, BatchError>
where
    F: FnOnce() -> Result<u64, BatchError>,
{
    if window.is_bounded() {
        return Ok(window);
    }

    let count = count()?;
    let total = if window.start == implicit_start {
        count
    } else {
        count.saturating_sub(window.start)
    };
    debug!("Counted {} records, {} remaining from {}", count, total, window.start);
    Ok(window.with_total(total))
}
