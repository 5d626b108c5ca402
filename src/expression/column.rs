//! Column reference leaf, including references to an enclosing query block

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::expression::schema::Schema;
use crate::types::{encode_to_vec, FieldType, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

const COLUMN_TAG: &str = "column";
const CORRELATED_TAG: &str = "correlated";

/// Reference to a column by its plan-wide unique id.
///
/// An outer (correlated) reference does not read the input row; the executor
/// of the enclosing block publishes the current outer value into its slot.
/// The derived `Clone` shares that slot, `deep_copy` does not.
#[derive(Debug, Clone)]
pub struct Column {
    pub unique_id: i64,
    pub name: String,
    pub table: Option<String>,
    pub field_type: FieldType,
    /// Row slot, set by index resolution
    pub index: Option<usize>,
    outer: Option<Arc<RwLock<Value>>>,
}

impl Column {
    pub fn new(unique_id: i64, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            unique_id,
            name: name.into(),
            table: None,
            field_type,
            index: None,
            outer: None,
        }
    }

    /// Reference to a column of an enclosing query block
    pub fn correlated(unique_id: i64, name: impl Into<String>, field_type: FieldType) -> Self {
        let mut column = Self::new(unique_id, name, field_type);
        column.outer = Some(Arc::new(RwLock::new(Value::Null)));
        column
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn is_correlated(&self) -> bool {
        self.outer.is_some()
    }

    /// Publish the current outer row's value. Plain columns ignore it.
    pub fn set_outer_value(&self, value: Value) {
        if let Some(slot) = &self.outer {
            *slot.write() = value;
        }
    }

    pub fn eval(&self, row: &[Value]) -> PrismDBResult<Value> {
        if let Some(slot) = &self.outer {
            return Ok(slot.read().clone());
        }
        let index = self.index.ok_or_else(|| {
            PrismDBError::Internal(format!("Column '{}' has no resolved index", self))
        })?;
        row.get(index).cloned().ok_or_else(|| {
            PrismDBError::Internal(format!(
                "Column '{}' reads slot {} of a row with {} values",
                self,
                index,
                row.len()
            ))
        })
    }

    pub fn hash_code(&self) -> Vec<u8> {
        let tag = if self.is_correlated() {
            CORRELATED_TAG
        } else {
            COLUMN_TAG
        };
        encode_to_vec(&[Value::string(tag), Value::Int(self.unique_id)])
    }

    pub fn equal(&self, other: &Column) -> bool {
        self.unique_id == other.unique_id && self.is_correlated() == other.is_correlated()
    }

    pub fn decorrelate(&mut self, schema: &Schema) {
        if self.is_correlated() && schema.contains(self.unique_id) {
            self.outer = None;
        }
    }

    pub fn resolve_indices(&mut self, schema: &Schema) -> PrismDBResult<()> {
        if self.is_correlated() {
            return Ok(());
        }
        match schema.column_index(self.unique_id) {
            Some(index) => {
                self.index = Some(index);
                Ok(())
            }
            None => Err(PrismDBError::Internal(format!(
                "Column '{}' (#{}) not found in schema",
                self, self.unique_id
            ))),
        }
    }

    /// Copy with an independent outer slot holding the current value
    pub fn deep_copy(&self) -> Column {
        let mut column = self.clone();
        column.outer = self
            .outer
            .as_ref()
            .map(|slot| Arc::new(RwLock::new(slot.read().clone())));
        column
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
