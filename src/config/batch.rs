//! Batch run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Checkpointing configuration for batch runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Enable checkpointing for resume support
    pub enable_checkpoints: bool,
    /// Checkpoint directory
    pub checkpoint_dir: PathBuf,
    /// Checkpoint interval (every N records)
    pub checkpoint_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enable_checkpoints: true,
            checkpoint_dir: PathBuf::from(".batchfeed/checkpoints"),
            checkpoint_interval: 1000,
        }
    }
}

impl BatchConfig {
    /// Default checkpoint file for a source
    pub fn checkpoint_path_for(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        self.checkpoint_dir.join(format!("{}.checkpoint", name))
    }
}
