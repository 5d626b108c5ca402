use crate::common::error::{PrismDBError, PrismDBResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL type codes. A code is finer than the [`TypeClass`] it maps to: DATE,
/// DATETIME and VARCHAR all live in the string-like class, for example.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    /// No type declared yet; builtins use it to defer to the caller's type
    Unspecified,
    /// NULL type
    Null,
    /// Boolean type (TRUE/FALSE), evaluated as an integer
    Boolean,
    /// 8-bit integer
    TinyInt,
    /// 16-bit integer
    SmallInt,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// 32-bit floating point
    Float,
    /// 64-bit double precision
    Double,
    /// Decimal with precision and scale
    Decimal { precision: u8, scale: u8 },
    /// Variable length string
    Varchar,
    /// Fixed length character string
    Char { length: usize },
    /// Text string (alias for VARCHAR)
    Text,
    /// Binary large object
    Blob,
    /// Calendar date
    Date,
    /// Date and time without time zone
    DateTime,
    /// Date and time normalized to UTC
    Timestamp,
    /// Signed time span
    Duration,
    /// JSON document
    JSON,
}

/// Coarse value category that selects the evaluator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeClass {
    Integer,
    Real,
    Decimal,
    /// Strings, blobs and the temporal codes
    String,
    Json,
}

/// Evaluator family an expression of a given type is evaluated through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalType {
    Int,
    Real,
    Decimal,
    String,
    Time,
    Duration,
    Json,
}

impl fmt::Display for EvalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvalType::Int => "INT",
            EvalType::Real => "REAL",
            EvalType::Decimal => "DECIMAL",
            EvalType::String => "STRING",
            EvalType::Time => "TIME",
            EvalType::Duration => "DURATION",
            EvalType::Json => "JSON",
        };
        write!(f, "{}", name)
    }
}

impl LogicalType {
    /// Map the type code to its evaluation class
    pub fn type_class(&self) -> TypeClass {
        match self {
            LogicalType::Null
            | LogicalType::Boolean
            | LogicalType::TinyInt
            | LogicalType::SmallInt
            | LogicalType::Integer
            | LogicalType::BigInt => TypeClass::Integer,
            LogicalType::Float | LogicalType::Double => TypeClass::Real,
            LogicalType::Decimal { .. } => TypeClass::Decimal,
            LogicalType::JSON => TypeClass::Json,
            LogicalType::Unspecified
            | LogicalType::Varchar
            | LogicalType::Char { .. }
            | LogicalType::Text
            | LogicalType::Blob
            | LogicalType::Date
            | LogicalType::DateTime
            | LogicalType::Timestamp
            | LogicalType::Duration => TypeClass::String,
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.type_class(),
            TypeClass::Integer | TypeClass::Real | TypeClass::Decimal
        ) && *self != LogicalType::Null
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            LogicalType::Varchar | LogicalType::Char { .. } | LogicalType::Text | LogicalType::Blob
        )
    }

    /// Date, datetime and timestamp: the codes evaluated through `eval_time`
    pub fn is_time(&self) -> bool {
        matches!(
            self,
            LogicalType::Date | LogicalType::DateTime | LogicalType::Timestamp
        )
    }

    /// Validate if a decimal precision and scale are valid
    pub fn validate_decimal(precision: u8, scale: u8) -> PrismDBResult<()> {
        if precision == 0 || precision > 28 {
            return Err(PrismDBError::Type(format!(
                "Decimal precision must be between 1 and 28, got {}",
                precision
            )));
        }
        if scale > precision {
            return Err(PrismDBError::Type(format!(
                "Decimal scale ({}) cannot be greater than precision ({})",
                scale, precision
            )));
        }
        Ok(())
    }

    /// Create a decimal type with validation
    pub fn decimal(precision: u8, scale: u8) -> PrismDBResult<LogicalType> {
        Self::validate_decimal(precision, scale)?;
        Ok(LogicalType::Decimal { precision, scale })
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Unspecified => write!(f, "UNSPECIFIED"),
            LogicalType::Null => write!(f, "NULL"),
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::TinyInt => write!(f, "TINYINT"),
            LogicalType::SmallInt => write!(f, "SMALLINT"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::Float => write!(f, "FLOAT"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Decimal { precision, scale } => {
                write!(f, "DECIMAL({},{})", precision, scale)
            }
            LogicalType::Varchar | LogicalType::Text => write!(f, "VARCHAR"),
            LogicalType::Char { length } => write!(f, "CHAR({})", length),
            LogicalType::Blob => write!(f, "BLOB"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::DateTime => write!(f, "DATETIME"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::Duration => write!(f, "TIME"),
            LogicalType::JSON => write!(f, "JSON"),
        }
    }
}

/// Column and result type flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeFlags {
    pub unsigned: bool,
    pub not_null: bool,
    pub binary: bool,
}

/// Full type descriptor of an expression: SQL type code plus flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub logical_type: LogicalType,
    pub flags: TypeFlags,
}

impl FieldType {
    pub fn new(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            flags: TypeFlags::default(),
        }
    }

    /// The "no declared type" marker returned by builtins that defer to the caller
    pub fn unspecified() -> Self {
        Self::new(LogicalType::Unspecified)
    }

    pub fn bigint() -> Self {
        Self::new(LogicalType::BigInt)
    }

    pub fn unsigned_bigint() -> Self {
        Self::new(LogicalType::BigInt).with_unsigned()
    }

    pub fn double() -> Self {
        Self::new(LogicalType::Double)
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::new(LogicalType::Decimal { precision, scale })
    }

    pub fn varchar() -> Self {
        Self::new(LogicalType::Varchar)
    }

    pub fn json() -> Self {
        Self::new(LogicalType::JSON)
    }

    pub fn with_unsigned(mut self) -> Self {
        self.flags.unsigned = true;
        self
    }

    pub fn with_not_null(mut self) -> Self {
        self.flags.not_null = true;
        self
    }

    pub fn type_class(&self) -> TypeClass {
        self.logical_type.type_class()
    }

    pub fn is_unspecified(&self) -> bool {
        self.logical_type == LogicalType::Unspecified
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.unsigned
    }

    /// Pick the evaluator: the class decides, and within the string-like
    /// class the type code separates temporal values from plain strings.
    pub fn eval_type(&self) -> EvalType {
        match self.type_class() {
            TypeClass::Integer => EvalType::Int,
            TypeClass::Real => EvalType::Real,
            TypeClass::Decimal => EvalType::Decimal,
            TypeClass::Json => EvalType::Json,
            TypeClass::String => match self.logical_type {
                LogicalType::Date | LogicalType::DateTime | LogicalType::Timestamp => {
                    EvalType::Time
                }
                LogicalType::Duration => EvalType::Duration,
                _ => EvalType::String,
            },
        }
    }
}

impl From<LogicalType> for FieldType {
    fn from(logical_type: LogicalType) -> Self {
        FieldType::new(logical_type)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.logical_type)?;
        if self.flags.unsigned {
            write!(f, " UNSIGNED")?;
        }
        Ok(())
    }
}

/// Type system utilities
pub struct TypeUtils;

impl TypeUtils {
    /// Class two operands are compared or combined in
    pub fn common_class(left: &FieldType, right: &FieldType) -> TypeClass {
        use TypeClass::*;

        match (left.type_class(), right.type_class()) {
            (a, b) if a == b => a,
            (Json, _) | (_, Json) => Json,
            (Real, _) | (_, Real) => Real,
            (String, _) | (_, String) => Real,
            (Decimal, _) | (_, Decimal) => Decimal,
            _ => Integer,
        }
    }
}
