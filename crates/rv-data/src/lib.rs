//! Loopback table service for the remote-view client.
//!
//! Tables are loaded from CSV into memory and served through the same
//! streaming request protocol a remote service speaks, so the client core can
//! be driven end to end without a network.

pub mod cache;
pub mod config;
pub mod loopback;
pub mod schema;
pub mod service;
pub mod sources;
pub mod table;

use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use cache::SortCache;
pub use config::{NullConfig, SourceConfig};
pub use loopback::LoopbackTransport;
pub use service::TableService;
pub use sources::CsvSource;
pub use table::Table;

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("Schema detection error: {0}")]
    SchemaDetection(String),

    #[error("Unknown column {0}")]
    UnknownColumn(String),

    #[error("Unknown table {0}")]
    UnknownTable(String),

    #[error("Unknown method {0}")]
    UnknownMethod(String),

    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                DataError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<regex::Error> for DataError {
    fn from(error: regex::Error) -> Self {
        DataError::BadArguments(error.to_string())
    }
}
