//! Table service: answers navigation requests over in-memory tables.
//!
//! Every request yields one or more partial results followed by a normal
//! close. `getNextK` is computed over growing prefixes of the table, one per
//! partition, the way a distributed service streams results as workers
//! report; the last partial is exact. Failures are sent as an error reply.

use std::cmp::Ordering;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use rv_core::navigation::{
    FindArgs, FindOptions, NextKArgs, QuantileArgs, FIND, GET_NEXT_K, GET_SCHEMA, QUANTILE,
};
use rv_core::rpc::{PartialResult, RequestId, RpcReply, RpcRequest, NORMAL_CLOSURE};
use rv_core::window::{FindResult, NextKList, RowValues, RowView};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::sources::CsvSource;
use crate::table::{display_text, SortColumn, Table};
use crate::DataError;

/// Close code for a server-side failure
const INTERNAL_ERROR: u16 = 1011;

/// What the service sends back on a request's connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message(String),
    Close(u16),
}

pub struct TableService {
    tables: RwLock<AHashMap<String, Arc<Table>>>,
    partitions: usize,
}

impl TableService {
    pub fn new() -> Self {
        Self::with_partitions(1)
    }

    /// Stream `partitions` partial results for each `getNextK`
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            tables: RwLock::new(AHashMap::new()),
            partitions: partitions.max(1),
        }
    }

    /// Register a table under a fresh id
    pub fn register(&self, table: Table) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.register_as(id.clone(), table);
        id
    }

    pub fn register_as(&self, id: impl Into<String>, table: Table) {
        let id = id.into();
        tracing::info!(table = %id, rows = table.row_count(), "table registered");
        self.tables.write().insert(id, Arc::new(table));
    }

    /// Read a CSV file and register it
    pub fn load_csv(&self, config: &SourceConfig) -> Result<String, DataError> {
        let table = CsvSource::new(config.clone()).read()?;
        Ok(self.register(table))
    }

    pub fn table(&self, id: &str) -> Result<Arc<Table>, DataError> {
        self.tables
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::UnknownTable(id.to_string()))
    }

    /// Handle one request envelope; the result always ends with a close
    pub fn handle(&self, request: &RpcRequest) -> Vec<Outgoing> {
        let request_id = request.request_id;
        let outcome = self
            .evaluate(request)
            .and_then(|partials| encode(request_id, partials));
        match outcome {
            Ok(mut outgoing) => {
                outgoing.push(Outgoing::Close(NORMAL_CLOSURE));
                outgoing
            }
            Err(err) => {
                warn!(request_id, method = %request.method, error = %err, "request failed");
                match serde_json::to_string(&RpcReply::error(request_id, err.to_string())) {
                    Ok(text) => vec![Outgoing::Message(text), Outgoing::Close(NORMAL_CLOSURE)],
                    Err(_) => vec![Outgoing::Close(INTERNAL_ERROR)],
                }
            }
        }
    }

    fn evaluate(&self, request: &RpcRequest) -> Result<Vec<PartialResult<Value>>, DataError> {
        let table = self.table(&request.object_id)?;
        debug!(request_id = request.request_id, method = %request.method, "evaluating");
        match request.method.as_str() {
            GET_SCHEMA => Ok(vec![complete(&table.summary())?]),
            GET_NEXT_K => {
                let args: NextKArgs = arguments(request)?;
                let total = table.row_count();
                let partitions = self.partitions.min(total).max(1);
                (1..=partitions)
                    .map(|k| -> Result<PartialResult<Value>, DataError> {
                        let scanned = total * k / partitions;
                        let list = next_k(&table, &args, scanned)?;
                        Ok(PartialResult::new(k as f64 / partitions as f64, serde_json::to_value(list)?))
                    })
                    .collect()
            }
            QUANTILE => {
                let args: QuantileArgs = arguments(request)?;
                Ok(vec![complete(&quantile(&table, &args)?)?])
            }
            FIND => {
                let args: FindArgs = arguments(request)?;
                Ok(vec![complete(&find(&table, &args)?)?])
            }
            other => Err(DataError::UnknownMethod(other.to_string())),
        }
    }
}

impl Default for TableService {
    fn default() -> Self {
        Self::new()
    }
}

fn arguments<T: DeserializeOwned>(request: &RpcRequest) -> Result<T, DataError> {
    serde_json::from_str(&request.arguments)
        .map_err(|e| DataError::BadArguments(format!("{}: {}", request.method, e)))
}

fn complete<T: Serialize>(value: &T) -> Result<PartialResult<Value>, DataError> {
    Ok(PartialResult::new(1.0, serde_json::to_value(value)?))
}

fn encode(request_id: RequestId, partials: Vec<PartialResult<Value>>) -> Result<Vec<Outgoing>, DataError> {
    partials
        .iter()
        .map(|partial| {
            let reply = RpcReply::success(request_id, serde_json::to_string(partial)?);
            Ok(Outgoing::Message(serde_json::to_string(&reply)?))
        })
        .collect()
}

/// Sorted positions of the rows among the first `scanned` table rows
fn candidates(sorted: &[usize], scanned: usize) -> Vec<usize> {
    sorted.iter().copied().filter(|&i| i < scanned).collect()
}

/// First position not ordered before `key`; with `past_equal` rows equal to the key are skipped too
fn lower_bound(table: &Table, rows: &[usize], columns: &[SortColumn], key: &[Value], past_equal: bool) -> usize {
    rows.partition_point(|&i| match table.compare_to(i, columns, key) {
        Ordering::Less => true,
        Ordering::Equal => past_equal,
        Ordering::Greater => false,
    })
}

/// Up to `rowsOnScreen` distinct rows starting at the anchor
pub fn next_k(table: &Table, args: &NextKArgs, scanned: usize) -> Result<NextKList, DataError> {
    let columns = table.sort_columns(&args.order)?;
    let sorted = table.sorted(&args.order)?;
    let rows = candidates(&sorted, scanned);
    let start = match &args.first_row {
        Some(anchor) => lower_bound(table, &rows, &columns, anchor, false),
        None => 0,
    };

    let mut window: Vec<RowView> = Vec::new();
    for &index in &rows[start..] {
        let values = table.project(index, &columns);
        match window.last_mut() {
            Some(last) if last.values == values => last.count += 1,
            _ => {
                if window.len() == args.rows_on_screen {
                    break;
                }
                window.push(RowView::new(1, values));
            }
        }
    }

    Ok(NextKList {
        rows_scanned: rows.len() as i64,
        start_position: start as i64,
        rows: window,
    })
}

/// Row at relative position `position` of the order; empty for an empty table
pub fn quantile(table: &Table, args: &QuantileArgs) -> Result<RowValues, DataError> {
    let columns = table.sort_columns(&args.order)?;
    let sorted = table.sorted(&args.order)?;
    if sorted.is_empty() {
        return Ok(Vec::new());
    }
    if args.table_size != sorted.len() as i64 {
        debug!(expected = args.table_size, actual = sorted.len(), "quantile over a changed table");
    }
    let last = sorted.len() - 1;
    let rank = ((args.position.clamp(0.0, 1.0) * sorted.len() as f64).floor() as usize).min(last);
    Ok(table.project(sorted[rank], &columns))
}

enum Matcher {
    Pattern(Regex),
    Text { needle: String, sub_string: bool, case_sensitive: bool },
}

impl Matcher {
    fn new(pattern: &str, options: FindOptions) -> Result<Self, DataError> {
        if options.regex {
            let pattern = if options.sub_string {
                pattern.to_string()
            } else {
                format!("^(?:{pattern})$")
            };
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(!options.case_sensitive)
                .build()?;
            return Ok(Matcher::Pattern(regex));
        }
        let needle = if options.case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        Ok(Matcher::Text {
            needle,
            sub_string: options.sub_string,
            case_sensitive: options.case_sensitive,
        })
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(text),
            Matcher::Text {
                needle,
                sub_string,
                case_sensitive,
            } => {
                let lowered;
                let text = if *case_sensitive {
                    text
                } else {
                    lowered = text.to_lowercase();
                    &lowered
                };
                if *sub_string {
                    text.contains(needle.as_str())
                } else {
                    text == needle
                }
            }
        }
    }

    fn matches_row(&self, table: &Table, index: usize, columns: &[SortColumn]) -> bool {
        table
            .project(index, columns)
            .iter()
            .filter_map(display_text)
            .any(|text| self.matches(&text))
    }
}

/// Next (or previous) row matching the search string among the visible columns
pub fn find(table: &Table, args: &FindArgs) -> Result<FindResult, DataError> {
    let columns = table.sort_columns(&args.order)?;
    let matcher = Matcher::new(&args.to_find, args.options)?;
    let sorted = table.sorted(&args.order)?;
    let matching: Vec<usize> = (0..sorted.len())
        .filter(|&p| matcher.matches_row(table, sorted[p], &columns))
        .collect();

    let found = match (&args.top_row, args.next) {
        (None, true) => matching.first().copied(),
        (None, false) => None,
        (Some(top), true) => {
            let from = lower_bound(table, &sorted, &columns, top, args.exclude_top_row);
            matching.iter().copied().find(|&p| p >= from)
        }
        (Some(top), false) => {
            let until = lower_bound(table, &sorted, &columns, top, !args.exclude_top_row);
            matching.iter().copied().rev().find(|&p| p < until)
        }
    };

    let Some(position) = found else {
        return Ok(FindResult {
            before: 0,
            at: 0,
            after: matching.len() as i64,
            first_matching_row: None,
        });
    };

    let key = table.project(sorted[position], &columns);
    let (mut before, mut at, mut after) = (0, 0, 0);
    for &p in &matching {
        match table.compare_to(sorted[p], &columns, &key) {
            Ordering::Less => before += 1,
            Ordering::Equal => at += 1,
            Ordering::Greater => after += 1,
        }
    }
    Ok(FindResult {
        before,
        at,
        after,
        first_matching_row: Some(key),
    })
}
