//! Argument shapes of the table methods used for navigation

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::order::RecordOrder;
use crate::window::RowValues;

pub const GET_SCHEMA: &str = "getSchema";
pub const GET_NEXT_K: &str = "getNextK";
pub const QUANTILE: &str = "quantile";
pub const FIND: &str = "find";

/// Arguments of `getNextK`.
///
/// `first_row` is inclusive: the reply starts at the first row that is not
/// smaller than it under `order`. A null anchor starts at the very first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextKArgs {
    pub to_find: Option<String>,
    pub order: RecordOrder,
    pub first_row: Option<RowValues>,
    pub rows_on_screen: usize,
}

/// Arguments of `quantile`; the reply is the row found at `position`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantileArgs {
    pub precision: u32,
    pub table_size: i64,
    pub order: RecordOrder,
    pub position: f64,
    pub seed: u64,
}

/// How a search string is matched against displayed values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    pub regex: bool,
    pub sub_string: bool,
    pub case_sensitive: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            regex: false,
            sub_string: true,
            case_sensitive: false,
        }
    }
}

impl From<&ClientConfig> for FindOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            regex: false,
            sub_string: config.find_sub_string,
            case_sensitive: config.find_case_sensitive,
        }
    }
}

/// Arguments of `find`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindArgs {
    pub to_find: String,
    #[serde(flatten)]
    pub options: FindOptions,
    /// Search starts here; `None` searches from the top of the table
    pub top_row: Option<RowValues>,
    pub order: RecordOrder,
    pub exclude_top_row: bool,
    /// Search forward when true, backward otherwise
    pub next: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_arguments_are_flat() {
        let args = FindArgs {
            to_find: "ana".into(),
            options: FindOptions::default(),
            top_row: None,
            order: RecordOrder::default(),
            exclude_top_row: true,
            next: false,
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["toFind"], "ana");
        assert_eq!(value["subString"], true);
        assert_eq!(value["caseSensitive"], false);
        assert_eq!(value["topRow"], json!(null));
        assert_eq!(value["excludeTopRow"], true);
    }
}
