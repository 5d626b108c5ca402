//! Row schema consulted by column references during rewrite passes

use crate::types::FieldType;
use serde::{Deserialize, Serialize};

/// One column of a row schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Plan-wide identity of the column, shared by every reference to it
    pub unique_id: i64,
    pub table: Option<String>,
    pub name: String,
    pub field_type: FieldType,
}

impl SchemaColumn {
    pub fn new(unique_id: i64, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            unique_id,
            table: None,
            name: name.into(),
            field_type,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Ordered column descriptors of a physical row. Slot `i` of a row holds
/// the value of `columns[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    /// Row slot of the column with `unique_id`
    pub fn column_index(&self, unique_id: i64) -> Option<usize> {
        self.columns.iter().position(|c| c.unique_id == unique_id)
    }

    pub fn contains(&self, unique_id: i64) -> bool {
        self.column_index(unique_id).is_some()
    }

    /// Case-insensitive lookup by column name, optionally qualified by table
    pub fn find_by_name(&self, table: Option<&str>, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| {
            c.name.eq_ignore_ascii_case(name)
                && match (table, &c.table) {
                    (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        })
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
