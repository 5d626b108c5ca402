//! Prism Scalar - scalar expression core of the PrismDB query engine
//!
//! Builds function expressions by name from a registry, folds constant
//! applications, evaluates expressions per result type class over a row,
//! and provides the structural operations the planner relies on: hashing,
//! equality, deep copy, decorrelation and column index resolution.
//!
pub mod common;
pub mod execution;
pub mod expression;
pub mod types;

// Re-export common types for convenience
pub use common::{PrismDBError, PrismDBResult};

// Re-export type system for convenience
pub use types::{EvalType, FieldType, LogicalType, Time, TypeClass, TypeUtils, Value};

// Re-export execution context for convenience
pub use execution::{ContextRef, ExecutionContext, SessionConfig, StatementContext};

// Re-export expression system for convenience
pub use expression::{
    build_cast_function, new_function, new_values_function, Column, Constant, Expression,
    FunctionRegistry, ScalarFunction, Schema, SchemaColumn,
};
