//! Configuration for batchfeed

mod batch;
mod logging;
mod reader;

pub use batch::BatchConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use reader::{CsvConfig, JsonConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for remote JSON sources
pub const DEFAULT_USER_AGENT: &str = concat!("batchfeed/", env!("CARGO_PKG_VERSION"));

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Delimited file parsing
    #[serde(default)]
    pub csv: CsvConfig,
    /// JSON sources and counting
    #[serde(default)]
    pub json: JsonConfig,
    /// Batch runs and checkpoints
    #[serde(default)]
    pub batch: BatchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // CSV validation
        for (name, ch) in [
            ("delimiter", self.csv.delimiter),
            ("enclosure", self.csv.enclosure),
            ("escape", self.csv.escape),
        ] {
            if !ch.is_ascii() {
                errors.push(format!("csv {} must be a single ASCII character, got '{}'", name, ch));
            }
        }
        if self.csv.delimiter == self.csv.enclosure {
            errors.push("csv delimiter and enclosure must differ".to_string());
        }

        // JSON validation
        if self.json.count_program.trim().is_empty() {
            errors.push("json count_program must not be empty".to_string());
        }
        if self.json.probe_timeout_secs == 0 {
            errors.push("json probe_timeout_secs must be positive".to_string());
        }

        // Batch validation
        if self.batch.checkpoint_interval == 0 {
            errors.push("batch checkpoint_interval must be positive".to_string());
        }
        if self.batch.enable_checkpoints && self.batch.checkpoint_dir.as_os_str().is_empty() {
            errors.push("batch checkpoint_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
