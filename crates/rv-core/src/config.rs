//! Client configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rpc::PROTOCOL_VERSION;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings shared by every view of a session.
///
/// Read from camelCase JSON; every missing field takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Rows requested per `getNextK`
    pub rows_per_page: usize,

    /// Precision hint sent with quantile requests
    pub quantile_precision: u32,

    /// Stamped on every outbound envelope
    pub protocol_version: u32,

    /// Sampling seed sent with quantile requests
    pub seed: u64,

    /// Default match options for find
    pub find_sub_string: bool,
    pub find_case_sensitive: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rows_per_page: 20,
            quantile_precision: 100,
            protocol_version: PROTOCOL_VERSION,
            seed: 0,
            find_sub_string: true,
            find_case_sensitive: false,
        }
    }
}

impl ClientConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ClientConfig::from_json(r#"{"rowsPerPage": 50}"#).unwrap();
        assert_eq!(config.rows_per_page, 50);
        assert_eq!(config.quantile_precision, 100);
        assert_eq!(config.protocol_version, 6);
        assert!(config.find_sub_string);
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            ClientConfig::from_json("{rowsPerPage"),
            Err(ConfigError::Parse(_))
        ));
    }
}
