//! Column descriptors shared by the client and the remote service

use serde::{Deserialize, Serialize};

/// Kind of values stored in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentsKind {
    Category,
    Json,
    String,
    Integer,
    Double,
    Date,
    Interval,
}

impl ContentsKind {
    /// Whether values of this kind are compared as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, ContentsKind::Integer | ContentsKind::Double | ContentsKind::Date)
    }

    /// Whether values of this kind are compared as text
    pub fn is_string(&self) -> bool {
        matches!(self, ContentsKind::Category | ContentsKind::Json | ContentsKind::String)
    }
}

/// Describes one column of a remote table.
///
/// Immutable once created; columns are identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescription {
    pub name: String,
    pub kind: ContentsKind,
    #[serde(default)]
    pub allow_missing: bool,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, kind: ContentsKind, allow_missing: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            allow_missing,
        }
    }
}

/// Ordered list of column descriptors with unique names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<ColumnDescription>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDescription>) -> Self {
        Self { columns }
    }

    /// Append a column, replacing any existing column with the same name
    pub fn append(&mut self, column: ColumnDescription) {
        self.columns.retain(|c| c.name != column.name);
        self.columns.push(column);
    }

    pub fn find(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl From<Vec<ColumnDescription>> for Schema {
    fn from(columns: Vec<ColumnDescription>) -> Self {
        Self::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replaces_same_name() {
        let mut schema = Schema::default();
        schema.append(ColumnDescription::new("a", ContentsKind::Integer, false));
        schema.append(ColumnDescription::new("b", ContentsKind::String, true));
        schema.append(ColumnDescription::new("a", ContentsKind::Double, false));

        assert_eq!(schema.column_names(), vec!["b", "a"]);
        assert_eq!(schema.find("a").map(|c| c.kind), Some(ContentsKind::Double));
    }

    #[test]
    fn serializes_as_camel_case_array() {
        let schema = Schema::new(vec![ColumnDescription::new("x", ContentsKind::Date, true)]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"name": "x", "kind": "Date", "allowMissing": true}])
        );
    }
}
