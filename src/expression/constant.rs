//! Literal leaf

use crate::execution::context::ExecutionContext;
use crate::types::{encode_to_vec, FieldType, LogicalType, Value};
use std::cmp::Ordering;
use std::fmt;

/// Literal value with its declared type
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: Value,
    pub field_type: FieldType,
}

impl Constant {
    /// Constant typed after its value
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        let field_type = value.default_type();
        Self { value, field_type }
    }

    pub fn with_type(value: Value, field_type: FieldType) -> Self {
        Self { value, field_type }
    }

    pub fn null() -> Self {
        Self::with_type(Value::Null, FieldType::new(LogicalType::Null))
    }

    pub fn hash_code(&self) -> Vec<u8> {
        encode_to_vec(std::slice::from_ref(&self.value))
    }

    /// Values compare equal under the session collation
    pub fn equal(&self, other: &Constant, ctx: &ExecutionContext) -> bool {
        match (&self.value, &other.value) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) => matches!(
                a.compare(b, ctx.statement().case_insensitive_collation),
                Ok(Ordering::Equal)
            ),
        }
    }
}

impl From<Value> for Constant {
    fn from(value: Value) -> Self {
        Constant::new(value)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
