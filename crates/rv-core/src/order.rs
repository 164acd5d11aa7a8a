//! Sort and visibility specification for a remote table view.
//!
//! A [`RecordOrder`] lists the visible columns in sort priority order, each
//! with a direction. Every window request is relative to one of these. Values
//! are never edited in place by a view: every change produces a new order that
//! replaces the previous one wholesale.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDescription, Schema};

/// One column of an ordering together with its direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSortOrientation {
    pub column_description: ColumnDescription,
    pub is_ascending: bool,
}

impl ColumnSortOrientation {
    pub fn new(column_description: ColumnDescription, is_ascending: bool) -> Self {
        Self {
            column_description,
            is_ascending,
        }
    }

    pub fn ascending(column_description: ColumnDescription) -> Self {
        Self::new(column_description, true)
    }

    pub fn descending(column_description: ColumnDescription) -> Self {
        Self::new(column_description, false)
    }

    pub fn name(&self) -> &str {
        &self.column_description.name
    }
}

/// Ordered sequence of (column, direction) pairs.
///
/// Each column name appears at most once. Editing methods consume the order
/// and return the edited copy:
///
/// ```
/// use rv_core::order::{ColumnSortOrientation, RecordOrder};
/// use rv_core::schema::{ColumnDescription, ContentsKind};
///
/// let city = ColumnDescription::new("city", ContentsKind::String, false);
/// let pop = ColumnDescription::new("population", ContentsKind::Integer, false);
///
/// let order = RecordOrder::default()
///     .show(ColumnSortOrientation::ascending(city))
///     .sort_first(ColumnSortOrientation::descending(pop));
///
/// assert_eq!(order.find("population"), Some(0));
/// assert_eq!(order.invert().invert(), order);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOrder {
    sort_orientation_list: Vec<ColumnSortOrientation>,
}

impl RecordOrder {
    /// Build an order from a list of entries; later duplicates replace earlier ones
    pub fn new(entries: Vec<ColumnSortOrientation>) -> Self {
        entries
            .into_iter()
            .fold(Self::default(), |order, entry| order.show(entry))
    }

    pub fn len(&self) -> usize {
        self.sort_orientation_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sort_orientation_list.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnSortOrientation> {
        self.sort_orientation_list.get(index)
    }

    pub fn entries(&self) -> &[ColumnSortOrientation] {
        &self.sort_orientation_list
    }

    /// Position of a column in the order, if it is visible
    pub fn find(&self, name: &str) -> Option<usize> {
        self.sort_orientation_list
            .iter()
            .position(|cso| cso.name() == name)
    }

    /// Remove a column; a column that is not present leaves the order unchanged
    pub fn hide(mut self, name: &str) -> Self {
        if let Some(index) = self.find(name) {
            self.sort_orientation_list.remove(index);
        }
        self
    }

    /// Move a column to the front, replacing any existing entry for it
    pub fn sort_first(mut self, entry: ColumnSortOrientation) -> Self {
        if let Some(index) = self.find(entry.name()) {
            self.sort_orientation_list.remove(index);
        }
        self.sort_orientation_list.insert(0, entry);
        self
    }

    /// Move a column to the back, replacing any existing entry for it
    pub fn show(mut self, entry: ColumnSortOrientation) -> Self {
        if let Some(index) = self.find(entry.name()) {
            self.sort_orientation_list.remove(index);
        }
        self.sort_orientation_list.push(entry);
        self
    }

    /// Append a column only if it is not already visible
    pub fn add_column_if_not_visible(self, entry: ColumnSortOrientation) -> Self {
        if self.find(entry.name()).is_some() {
            self
        } else {
            self.show(entry)
        }
    }

    /// Flip the direction of a single column
    pub fn toggle(mut self, name: &str) -> Self {
        if let Some(index) = self.find(name) {
            let entry = &mut self.sort_orientation_list[index];
            entry.is_ascending = !entry.is_ascending;
        }
        self
    }

    /// A new order with every direction flipped, used to read backwards from an anchor
    pub fn invert(&self) -> Self {
        Self {
            sort_orientation_list: self
                .sort_orientation_list
                .iter()
                .map(|cso| ColumnSortOrientation::new(cso.column_description.clone(), !cso.is_ascending))
                .collect(),
        }
    }

    /// Descriptors of the visible columns, in order
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.sort_orientation_list
                .iter()
                .map(|cso| cso.column_description.clone())
                .collect(),
        )
    }
}

impl std::fmt::Display for RecordOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .sort_orientation_list
            .iter()
            .map(|cso| format!("{} {}", cso.name(), if cso.is_ascending { "up" } else { "down" }))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ContentsKind;

    fn col(name: &str) -> ColumnDescription {
        ColumnDescription::new(name, ContentsKind::Integer, false)
    }

    fn sample() -> RecordOrder {
        RecordOrder::new(vec![
            ColumnSortOrientation::ascending(col("a")),
            ColumnSortOrientation::descending(col("b")),
            ColumnSortOrientation::ascending(col("c")),
        ])
    }

    #[test]
    fn hide_absent_column_is_noop() {
        let order = sample();
        let hidden = order.clone().hide("zzz");
        assert_eq!(hidden.len(), order.len());
        assert_eq!(hidden, order);
    }

    #[test]
    fn hide_removes_column() {
        let order = sample().hide("b");
        assert_eq!(order.len(), 2);
        assert_eq!(order.find("b"), None);
        assert_eq!(order.find("c"), Some(1));
    }

    #[test]
    fn invert_round_trips() {
        let order = sample();
        let inverted = order.invert();
        assert!(inverted.entries().iter().zip(order.entries()).all(|(i, o)| i.is_ascending != o.is_ascending));
        assert_eq!(inverted.invert(), order);
    }

    #[test]
    fn sort_first_replaces_existing_entry() {
        let order = sample().sort_first(ColumnSortOrientation::ascending(col("c")));
        let names: Vec<&str> = order.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn show_moves_to_back() {
        let order = sample().show(ColumnSortOrientation::descending(col("a")));
        let names: Vec<&str> = order.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert!(!order.get(2).unwrap().is_ascending);
    }

    #[test]
    fn new_deduplicates_names() {
        let order = RecordOrder::new(vec![
            ColumnSortOrientation::ascending(col("a")),
            ColumnSortOrientation::descending(col("a")),
        ]);
        assert_eq!(order.len(), 1);
        assert!(!order.get(0).unwrap().is_ascending);
    }

    #[test]
    fn toggle_and_add_if_not_visible() {
        let order = sample().toggle("a");
        assert!(!order.get(0).unwrap().is_ascending);

        let unchanged = order.clone().add_column_if_not_visible(ColumnSortOrientation::ascending(col("b")));
        assert_eq!(unchanged, order);

        let extended = order.add_column_if_not_visible(ColumnSortOrientation::ascending(col("d")));
        assert_eq!(extended.find("d"), Some(3));
    }

    #[test]
    fn wire_shape_matches_service() {
        let order = RecordOrder::default().show(ColumnSortOrientation::ascending(col("a")));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sortOrientationList": [{
                    "columnDescription": {"name": "a", "kind": "Integer", "allowMissing": false},
                    "isAscending": true
                }]
            })
        );
    }
}
