use std::fs::File;
use std::io::{BufReader, Read};

use ahash::AHashSet;
use csv::ReaderBuilder;
use rayon::prelude::*;
use serde_json::Value;
use rv_core::schema::Schema;
use tracing::{info, warn};

use crate::config::SourceConfig;
use crate::schema::SchemaDetector;
use crate::table::Table;
use crate::DataError;

/// CSV data source: reads a whole file into an in-memory table
pub struct CsvSource {
    config: SourceConfig,
}

impl CsvSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Load on the blocking pool
    pub async fn load(self) -> Result<Table, DataError> {
        tokio::task::spawn_blocking(move || self.read()).await?
    }

    /// Read the configured file
    pub fn read(&self) -> Result<Table, DataError> {
        let file = File::open(&self.config.path)?;
        let table = self.read_from(BufReader::new(file))?;
        info!(
            file = %self.config.file_name(),
            rows = table.row_count(),
            columns = table.schema().len(),
            "loaded csv"
        );
        Ok(table)
    }

    /// Parse CSV text from any reader
    pub fn read_from<R: Read>(&self, reader: R) -> Result<Table, DataError> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter_byte()?)
            .has_headers(self.config.has_header)
            .flexible(true)
            .from_reader(reader);

        let mut records: Vec<Vec<String>> = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            records.push(record.iter().map(str::to_string).collect());
        }

        let width = records.iter().map(Vec::len).max().unwrap_or(0);
        let header_names: Vec<String> = if self.config.has_header {
            csv_reader.headers()?.iter().map(str::to_string).collect()
        } else {
            Vec::new()
        };
        let headers = column_names(&header_names, width);

        let detector = SchemaDetector::new(self.config.null_config.clone())
            .with_sample_size(self.config.sample_size);
        let info = detector.detect_from_samples(&headers, &records);
        let kinds: Vec<_> = info.schema.columns().iter().map(|c| c.kind).collect();

        let rows: Vec<Vec<Value>> = records
            .par_iter()
            .map(|record| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(i, kind)| match record.get(i) {
                        Some(text) => detector.parse_cell(*kind, text),
                        None => Value::Null,
                    })
                    .collect()
            })
            .collect();

        Table::new(allow_late_missing(info.schema, &rows), rows)
    }
}

/// Mark columns that hold missing values the sampled rows did not show,
/// i.e. cells past the sample that failed the inferred kind or were absent
fn allow_late_missing(schema: Schema, rows: &[Vec<Value>]) -> Schema {
    let columns = schema
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut column = column.clone();
            if column.allow_missing {
                return column;
            }
            if let Some(row) = rows.iter().position(|r| r[i].is_null()) {
                warn!(
                    column = %column.name,
                    kind = ?column.kind,
                    row,
                    "value does not match the inferred kind, stored as missing"
                );
                column.allow_missing = true;
            }
            column
        })
        .collect();
    Schema::new(columns)
}

/// Header names padded to `width`; blank or repeated names get positional ones
fn column_names(headers: &[String], width: usize) -> Vec<String> {
    let mut seen = AHashSet::new();
    (0..width.max(headers.len()))
        .map(|i| {
            let name = headers.get(i).map(|h| h.trim()).unwrap_or_default();
            if name.is_empty() || !seen.insert(name.to_string()) {
                format!("column{}", i)
            } else {
                name.to_string()
            }
        })
        .collect()
}
