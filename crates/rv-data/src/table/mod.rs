//! In-memory tables and value ordering

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use rv_core::order::RecordOrder;
use rv_core::schema::Schema;
use rv_core::window::{RowValues, TableSummary};
use serde_json::Value;

use crate::cache::SortCache;
use crate::DataError;

/// A column position in the table and its sort direction
pub type SortColumn = (usize, bool);

/// Row-major table held in memory
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
    sort_cache: SortCache,
}

impl Table {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, DataError> {
        if let Some(bad) = rows.iter().position(|r| r.len() != schema.len()) {
            return Err(DataError::SchemaDetection(format!(
                "row {} has {} values, schema has {} columns",
                bad,
                rows[bad].len(),
                schema.len()
            )));
        }
        Ok(Self {
            schema,
            rows,
            sort_cache: SortCache::default(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            schema: self.schema.clone(),
            row_count: self.rows.len() as i64,
        }
    }

    /// Resolve the columns of `order` against the schema
    pub fn sort_columns(&self, order: &RecordOrder) -> Result<Vec<SortColumn>, DataError> {
        order
            .entries()
            .iter()
            .map(|entry| {
                self.schema
                    .index_of(entry.name())
                    .map(|index| (index, entry.is_ascending))
                    .ok_or_else(|| DataError::UnknownColumn(entry.name().to_string()))
            })
            .collect()
    }

    /// Values of row `index` on the given columns
    pub fn project(&self, index: usize, columns: &[SortColumn]) -> RowValues {
        let row = &self.rows[index];
        columns.iter().map(|(c, _)| row[*c].clone()).collect()
    }

    /// Compare row `index` with a projected key under the column directions
    pub fn compare_to(&self, index: usize, columns: &[SortColumn], key: &[Value]) -> Ordering {
        let row = &self.rows[index];
        for ((column, ascending), value) in columns.iter().zip(key) {
            let ordering = compare_values(&row[*column], value);
            let ordering = if *ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn compare_rows(&self, a: usize, b: usize, columns: &[SortColumn]) -> Ordering {
        let (left, right) = (&self.rows[a], &self.rows[b]);
        for (column, ascending) in columns {
            let ordering = compare_values(&left[*column], &right[*column]);
            let ordering = if *ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Row indices sorted by `order`, cached per order
    pub fn sorted(&self, order: &RecordOrder) -> Result<Arc<Vec<usize>>, DataError> {
        if let Some(permutation) = self.sort_cache.get(order) {
            return Ok(permutation);
        }
        let columns = self.sort_columns(order)?;
        let mut permutation: Vec<usize> = (0..self.rows.len()).collect();
        permutation.par_sort_by(|a, b| self.compare_rows(*a, *b, &columns));
        let permutation = Arc::new(permutation);
        self.sort_cache.put(order, permutation.clone());
        tracing::debug!(%order, rows = self.rows.len(), "sorted table");
        Ok(permutation)
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order on cell values: missing values first, numbers numerically,
/// strings lexically
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Text a value is searched as; missing values have none
pub fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
