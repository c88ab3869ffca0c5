//! Batch window resolution
//!
//! Every batch-capable command accepts optional `start`, `end` and `num-items`
//! bounds. [`RawWindow::resolve`] turns those raw strings into a validated
//! [`BatchWindow`] that the readers consume.

use super::source::BatchError;
use serde::{Deserialize, Serialize};

/// Normalized `start..end` window over a file's records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    /// First offset to produce
    pub start: u64,
    /// Upper bound (None = unbounded)
    pub end: Option<u64>,
    /// Number of records the window covers, when known
    pub total: Option<u64>,
}

impl BatchWindow {
    /// Build a window from typed bounds
    pub fn new(start: u64, end: Option<u64>) -> Result<Self, BatchError> {
        if let Some(end) = end {
            if end < start {
                return Err(BatchError::Validation(
                    "end must not precede start".to_string(),
                ));
            }
        }
        Ok(Self {
            start,
            end,
            total: end.map(|end| end - start),
        })
    }

    /// Window running from `start` to end of file
    pub fn unbounded(start: u64) -> Self {
        Self {
            start,
            end: None,
            total: None,
        }
    }

    /// Copy of this window carrying a counted total
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.end.is_some()
    }
}

/// Unparsed window bounds as they arrive from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawWindow {
    pub start: Option<String>,
    pub end: Option<String>,
    pub num_items: Option<String>,
}

impl RawWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, start: impl ToString) -> Self {
        self.start = Some(start.to_string());
        self
    }

    pub fn with_end(mut self, end: impl ToString) -> Self {
        self.end = Some(end.to_string());
        self
    }

    pub fn with_num_items(mut self, num_items: impl ToString) -> Self {
        self.num_items = Some(num_items.to_string());
        self
    }

    /// Resolve into a [`BatchWindow`].
    ///
    /// `num_items` only applies while `end` is unbounded; an explicit `end`
    /// always wins.
    pub fn resolve(&self, default_start: u64) -> Result<BatchWindow, BatchError> {
        let start = match &self.start {
            Some(raw) => parse_bound(raw)?,
            None => default_start,
        };
        let num_items = self.num_items.as_deref().map(parse_bound).transpose()?;
        let mut end = self.end.as_deref().map(parse_bound).transpose()?;

        if end.is_none() {
            if let Some(n) = num_items {
                end = Some(start.checked_add(n).ok_or_else(|| {
                    BatchError::Validation("start + num-items overflows".to_string())
                })?);
            }
        }

        BatchWindow::new(start, end)
    }
}

fn parse_bound(raw: &str) -> Result<u64, BatchError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| BatchError::Validation("start/end must be numeric".to_string()))
}
