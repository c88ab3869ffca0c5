//! Log sinks for recoverable reader failures
//!
//! Readers that degrade instead of failing (the JSON reader) report what they
//! skipped through an injected [`LogSink`], so batch jobs can keep an audit
//! trail next to their normal tracing output.

use crate::config::LogLevel;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for reader log messages
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards messages to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!("{}", message),
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Append-only log file, optionally echoed to stderr
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
    echo: bool,
}

impl FileLogSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>, echo: bool) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            echo,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        let line = format!(
            "{} [{}] {}",
            Utc::now().to_rfc3339(),
            level.as_str().to_uppercase(),
            message
        );

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("Failed to write to log file {}: {}", self.path.display(), e);
        }

        if self.echo {
            eprintln!("{}", line);
        }
    }
}
