//! Logical windows over a remotely ordered table

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Schema;

/// Values of one row, projected on the columns of the current order
pub type RowValues = Vec<Value>;

/// A compressed row: `count` physically identical rows sharing `values`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub count: i64,
    pub values: RowValues,
}

impl RowView {
    pub fn new(count: i64, values: RowValues) -> Self {
        Self { count, values }
    }
}

/// Result of a `getNextK` request as sent by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextKList {
    /// Total number of rows in the table
    pub rows_scanned: i64,
    /// Number of rows strictly before the first returned row, under the request order
    pub start_position: i64,
    #[serde(default)]
    pub rows: Vec<RowView>,
}

/// Result of a `find` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResult {
    /// Matches before the first matching row
    pub before: i64,
    /// Matches equal to the first matching row
    pub at: i64,
    /// Matches after the first matching row
    pub after: i64,
    pub first_matching_row: Option<RowValues>,
}

impl FindResult {
    pub fn has_match(&self) -> bool {
        self.at > 0 && self.first_matching_row.is_some()
    }
}

/// Result of a `getSchema` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub schema: Schema,
    pub row_count: i64,
}

/// The contiguous slice of the remote table currently displayed by a view.
///
/// `start_position` is the logical offset of the first row in forward-order
/// coordinates. Windows are values: navigation never edits one in place, it
/// builds a new one and replaces the old.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalWindow {
    pub schema: Schema,
    pub total_row_count: i64,
    pub start_position: i64,
    pub rows: Vec<RowView>,
}

impl LogicalWindow {
    /// Build a window from a service reply.
    ///
    /// When the request used an inverted order, `reversed` re-expresses the
    /// reply in forward-order coordinates.
    pub fn from_next_k(schema: Schema, list: NextKList, reversed: bool) -> Self {
        let window = Self {
            schema,
            total_row_count: list.rows_scanned,
            start_position: list.start_position,
            rows: list.rows,
        };
        if reversed {
            window.reversed()
        } else {
            window
        }
    }

    /// Empty window over a table of the given size
    pub fn empty(schema: Schema, total_row_count: i64) -> Self {
        Self {
            schema,
            total_row_count,
            start_position: 0,
            rows: Vec::new(),
        }
    }

    /// Number of table rows covered by this window; multiplicities are additive
    pub fn displayed_row_count(&self) -> i64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// The same rows read in the opposite direction
    pub fn reversed(self) -> Self {
        let displayed = self.displayed_row_count();
        let start_position = (self.total_row_count - self.start_position - displayed).max(0);
        let mut rows = self.rows;
        rows.reverse();
        Self {
            schema: self.schema,
            total_row_count: self.total_row_count,
            start_position,
            rows,
        }
    }

    pub fn first_row(&self) -> Option<&RowView> {
        self.rows.first()
    }

    pub fn last_row(&self) -> Option<&RowView> {
        self.rows.last()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the last displayed row is at (or next to) the end of the table
    pub fn at_bottom(&self) -> bool {
        self.start_position + self.displayed_row_count() >= self.total_row_count - 1
    }

    pub fn at_top(&self) -> bool {
        self.start_position <= 0
    }

    /// `start_position + displayed <= total_row_count`, and nothing is negative
    pub fn is_consistent(&self) -> bool {
        self.start_position >= 0
            && self.rows.iter().all(|r| r.count >= 0)
            && self.start_position + self.displayed_row_count() <= self.total_row_count
    }

    /// Fraction of the table before the first row, in percent
    pub fn start_percent(&self) -> f64 {
        percent(self.start_position, self.total_row_count)
    }

    /// Fraction of the table covered by the window, as `(top, bottom)` in [0, 1]
    pub fn scroll_extent(&self) -> (f64, f64) {
        if self.total_row_count <= 0 {
            return (0.0, 1.0);
        }
        let total = self.total_row_count as f64;
        let top = self.start_position as f64 / total;
        let bottom = (self.start_position + self.displayed_row_count()) as f64 / total;
        (top.clamp(0.0, 1.0), bottom.clamp(0.0, 1.0))
    }

    /// Percentage of the table represented by one row
    pub fn row_percent(&self, row: &RowView) -> f64 {
        percent(row.count, self.total_row_count)
    }
}

fn percent(part: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(counts: &[i64]) -> Vec<RowView> {
        counts
            .iter()
            .enumerate()
            .map(|(i, c)| RowView::new(*c, vec![json!(i)]))
            .collect()
    }

    #[test]
    fn reversal_recomputes_start() {
        // 1000 rows, backwards page of 20 rows whose anchor has 899 rows after it
        let list = NextKList {
            rows_scanned: 1000,
            start_position: 899,
            rows: rows(&[1; 20]),
        };
        let window = LogicalWindow::from_next_k(Schema::default(), list, true);
        assert_eq!(window.start_position, 81);
        assert_eq!(window.rows.first().unwrap().values, vec![json!(19)]);
        assert!(window.is_consistent());
    }

    #[test]
    fn multiplicities_are_additive() {
        let window = LogicalWindow {
            schema: Schema::default(),
            total_row_count: 50,
            start_position: 10,
            rows: rows(&[3, 1, 6]),
        };
        assert_eq!(window.displayed_row_count(), 10);
        assert!(!window.at_bottom());
        assert!(window.is_consistent());
        assert_eq!(window.row_percent(&window.rows[2]), 12.0);

        let reversed = window.clone().reversed();
        assert_eq!(reversed.start_position, 30);
        assert_eq!(reversed.rows[0].count, 6);
        // reversing twice restores the original window
        assert_eq!(reversed.reversed(), window);
    }

    #[test]
    fn detects_inconsistent_window() {
        let window = LogicalWindow {
            schema: Schema::default(),
            total_row_count: 5,
            start_position: 3,
            rows: rows(&[2, 2]),
        };
        assert!(!window.is_consistent());
    }

    #[test]
    fn scroll_extent_of_empty_table() {
        let window = LogicalWindow::empty(Schema::default(), 0);
        assert_eq!(window.scroll_extent(), (0.0, 1.0));
        assert_eq!(window.start_percent(), 0.0);
    }

    #[test]
    fn parses_service_reply() {
        let list: NextKList = serde_json::from_value(json!({
            "rowsScanned": 7,
            "startPosition": 2,
            "rows": [{"count": 2, "values": ["x", 1]}]
        }))
        .unwrap();
        assert_eq!(list.rows[0].count, 2);
        assert_eq!(list.rows[0].values, vec![json!("x"), json!(1)]);
    }
}
