//! Scalar expression system
//!
//! Expression trees of columns, constants and scalar function applications,
//! the function registry they are built from, constant folding and the
//! per-type evaluators.

pub mod cast;
pub mod column;
pub mod constant;
pub mod control_functions;
pub mod datetime_functions;
pub mod expression;
pub mod folding;
pub mod function;
pub mod json_functions;
pub mod operator;
pub mod scalar_function;
pub mod schema;
pub mod string_functions;

pub use column::Column;
pub use constant::Constant;
pub use expression::{EvalResult, Expression};
pub use folding::{fold_constant, fold_expression};
pub use function::{BaseBuiltin, BuiltinFunction, FunctionClass, FunctionFactory, FunctionRegistry};
pub use scalar_function::{
    build_cast_function, new_function, new_values_function, scalar_functions_to_exprs, FuncName,
    ScalarFunction,
};
pub use schema::{Schema, SchemaColumn};
