//! Reader configuration for delimited and JSON sources

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Delimited file (CSV) parsing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Column separator
    pub delimiter: char,
    /// Field enclosure character
    pub enclosure: char,
    /// Escape character inside enclosed fields
    pub escape: char,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            enclosure: '"',
            escape: '\\',
        }
    }
}

/// JSON source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// External program used to count array entries (invoked like `jq`)
    pub count_program: String,
    /// Timeout for remote sources (seconds)
    pub probe_timeout_secs: u64,
    /// User agent for remote sources
    pub user_agent: String,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            count_program: "jq".to_string(),
            probe_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
