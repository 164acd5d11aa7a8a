//! Configuration of a table loaded into the loopback service

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;
use crate::DataError;

/// How to read one CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceConfig {
    /// Path to the file
    pub path: PathBuf,

    /// Field delimiter
    pub delimiter: char,

    /// Whether the first record holds column names
    pub has_header: bool,

    /// Rows inspected for type inference
    pub sample_size: usize,

    /// Number of partial results streamed per request
    pub partitions: usize,

    /// Null handling configuration
    pub null_config: NullConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            delimiter: ',',
            has_header: true,
            sample_size: 1000,
            partitions: 4,
            null_config: NullConfig::default(),
        }
    }
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Read a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Get the file name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    /// The delimiter as the single byte the csv reader expects
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(DataError::BadArguments(format!(
                "delimiter {:?} is not ASCII",
                self.delimiter
            )))
        }
    }
}
