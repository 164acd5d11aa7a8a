//! Column type inference for loaded text data

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rv_core::schema::{ColumnDescription, ContentsKind, Schema};
use serde_json::Value;

use crate::config::NullConfig;

/// String columns with at least this many samples may be categorical
const CATEGORY_MIN_SAMPLES: usize = 20;

/// Schema detector for analyzing data and determining column types
pub struct SchemaDetector {
    sample_size: usize,
    null_config: NullConfig,
}

/// Information about a detected schema
#[derive(Debug, Clone)]
pub struct SchemaInfo {
    pub schema: Schema,
    pub column_stats: AHashMap<String, ColumnStats>,
}

/// Statistics about a sampled column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStats {
    pub null_count: usize,
    pub distinct_count: usize,
    pub non_null_count: usize,
}

impl SchemaDetector {
    /// Create a new schema detector
    pub fn new(null_config: NullConfig) -> Self {
        Self {
            sample_size: 1000,
            null_config,
        }
    }

    /// Set the sample size for detection
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = size.max(1);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Detect schema from sample data
    pub fn detect_from_samples(&self, headers: &[String], samples: &[Vec<String>]) -> SchemaInfo {
        let samples = &samples[..samples.len().min(self.sample_size)];
        let mut columns = Vec::with_capacity(headers.len());
        let mut column_stats = AHashMap::new();

        for (col_idx, header) in headers.iter().enumerate() {
            let (kind, stats) = self.analyze_column(samples, col_idx);
            columns.push(ColumnDescription::new(header.clone(), kind, stats.null_count > 0));
            column_stats.insert(header.clone(), stats);
        }

        SchemaInfo {
            schema: Schema::new(columns),
            column_stats,
        }
    }

    /// Analyze a single column
    fn analyze_column(&self, samples: &[Vec<String>], col_idx: usize) -> (ContentsKind, ColumnStats) {
        let mut null_count = 0;
        let mut values: Vec<&str> = Vec::new();
        let mut is_int = true;
        let mut is_float = true;
        let mut is_date = true;
        let mut is_json = true;

        for row in samples {
            let Some(value) = row.get(col_idx).filter(|v| !self.null_config.is_null(v)) else {
                null_count += 1;
                continue;
            };
            let value = value.trim();
            values.push(value);

            if is_int && value.parse::<i64>().is_err() {
                is_int = false;
            }
            if is_float && value.parse::<f64>().is_err() {
                is_float = false;
            }
            if is_date && !looks_like_date(value) {
                is_date = false;
            }
            if is_json && !looks_like_json(value) {
                is_json = false;
            }
        }

        let distinct_count = values.iter().collect::<AHashSet<_>>().len();
        let stats = ColumnStats {
            null_count,
            distinct_count,
            non_null_count: values.len(),
        };

        let kind = if values.is_empty() {
            ContentsKind::String
        } else if is_int {
            ContentsKind::Integer
        } else if is_float {
            ContentsKind::Double
        } else if is_date {
            ContentsKind::Date
        } else if is_json {
            ContentsKind::Json
        } else if values.len() >= CATEGORY_MIN_SAMPLES && distinct_count * 10 <= values.len() {
            ContentsKind::Category
        } else {
            ContentsKind::String
        };

        (kind, stats)
    }

    /// Convert one cell to a value of the column kind; unparsable cells are missing
    pub fn parse_cell(&self, kind: ContentsKind, text: &str) -> Value {
        if self.null_config.is_null(text) {
            return Value::Null;
        }
        let text = text.trim();
        match kind {
            ContentsKind::Integer => text.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            ContentsKind::Double => text
                .parse::<f64>()
                .ok()
                .and_then(|v| serde_json::Number::from_f64(v).map(Value::Number))
                .unwrap_or(Value::Null),
            _ => Value::String(text.to_string()),
        }
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new(NullConfig::default())
    }
}

fn looks_like_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn looks_like_json(value: &str) -> bool {
    (value.starts_with('{') || value.starts_with('['))
        && serde_json::from_str::<Value>(value).is_ok()
}
