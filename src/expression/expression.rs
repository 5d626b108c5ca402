//! Core expression tree for PrismDB scalar evaluation

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::column::Column;
use crate::expression::constant::Constant;
use crate::expression::function::FunctionRegistry;
use crate::expression::scalar_function::ScalarFunction;
use crate::expression::schema::Schema;
use crate::types::{EvalType, FieldType, LogicalType, Time, Value};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// Result of a per-class evaluator: `Ok(None)` is SQL NULL, which is
/// distinct from a failure.
pub type EvalResult<T> = PrismDBResult<Option<T>>;

/// A node of a scalar computation tree
#[derive(Debug, Clone)]
pub enum Expression {
    Column(Column),
    Constant(Constant),
    ScalarFunction(ScalarFunction),
}

impl Expression {
    /// Declared type, fixed at construction
    pub fn field_type(&self) -> &FieldType {
        match self {
            Expression::Column(c) => &c.field_type,
            Expression::Constant(c) => &c.field_type,
            Expression::ScalarFunction(sf) => &sf.ret_type,
        }
    }

    pub fn eval_type(&self) -> EvalType {
        self.field_type().eval_type()
    }

    /// Evaluate into a tagged datum, dispatching once on the declared type
    pub fn eval(&self, ctx: &ExecutionContext, row: &[Value]) -> PrismDBResult<Value> {
        match self {
            Expression::Column(c) => c.eval(row),
            Expression::Constant(c) => Ok(c.value.clone()),
            Expression::ScalarFunction(sf) => sf.eval(ctx, row),
        }
    }

    pub fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        match self {
            Expression::Column(c) => value_as_int(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_int(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_int(ctx, row),
        }
    }

    pub fn eval_real(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<f64> {
        match self {
            Expression::Column(c) => value_as_real(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_real(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_real(ctx, row),
        }
    }

    pub fn eval_decimal(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Decimal> {
        match self {
            Expression::Column(c) => value_as_decimal(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_decimal(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_decimal(ctx, row),
        }
    }

    pub fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        match self {
            Expression::Column(c) => value_as_string(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_string(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_string(ctx, row),
        }
    }

    pub fn eval_time(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Time> {
        let target = self.time_target();
        match self {
            Expression::Column(c) => value_as_time(&c.eval(row)?, ctx, &target),
            Expression::Constant(c) => value_as_time(&c.value, ctx, &target),
            Expression::ScalarFunction(sf) => sf.eval_time(ctx, row),
        }
    }

    pub fn eval_duration(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Duration> {
        match self {
            Expression::Column(c) => value_as_duration(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_duration(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_duration(ctx, row),
        }
    }

    pub fn eval_json(
        &self,
        ctx: &ExecutionContext,
        row: &[Value],
    ) -> EvalResult<serde_json::Value> {
        match self {
            Expression::Column(c) => value_as_json(&c.eval(row)?, ctx),
            Expression::Constant(c) => value_as_json(&c.value, ctx),
            Expression::ScalarFunction(sf) => sf.eval_json(ctx, row),
        }
    }

    fn time_target(&self) -> LogicalType {
        let logical_type = &self.field_type().logical_type;
        if logical_type.is_time() {
            logical_type.clone()
        } else {
            LogicalType::DateTime
        }
    }

    /// Canonical structural encoding used for deduplication
    pub fn hash_code(&self) -> Vec<u8> {
        match self {
            Expression::Column(c) => c.hash_code(),
            Expression::Constant(c) => c.hash_code(),
            Expression::ScalarFunction(sf) => sf.hash_code(),
        }
    }

    /// Structural equality; `ctx` decides collation-sensitive details
    pub fn equal(&self, other: &Expression, ctx: &ExecutionContext) -> bool {
        match (self, other) {
            (Expression::Column(a), Expression::Column(b)) => a.equal(b),
            (Expression::Constant(a), Expression::Constant(b)) => a.equal(b, ctx),
            (Expression::ScalarFunction(a), Expression::ScalarFunction(b)) => a.equal(b, ctx),
            _ => false,
        }
    }

    /// Whether any leaf references a column of an enclosing query block
    pub fn is_correlated(&self) -> bool {
        match self {
            Expression::Column(c) => c.is_correlated(),
            Expression::Constant(_) => false,
            Expression::ScalarFunction(sf) => sf.is_correlated(),
        }
    }

    /// Turn outer references into plain columns when `schema` provides them
    pub fn decorrelate(&mut self, schema: &Schema) {
        match self {
            Expression::Column(c) => c.decorrelate(schema),
            Expression::Constant(_) => {}
            Expression::ScalarFunction(sf) => sf.decorrelate(schema),
        }
    }

    /// Bind column references to row slots of `schema`
    pub fn resolve_indices(&mut self, schema: &Schema) -> PrismDBResult<()> {
        match self {
            Expression::Column(c) => c.resolve_indices(schema),
            Expression::Constant(_) => Ok(()),
            Expression::ScalarFunction(sf) => sf.resolve_indices(schema),
        }
    }

    /// Independent copy of the tree. Functions are rebuilt through the
    /// registry, so foldable subtrees fold again.
    pub fn deep_copy(&self, registry: &FunctionRegistry) -> PrismDBResult<Expression> {
        match self {
            Expression::Column(c) => Ok(Expression::Column(c.deep_copy())),
            Expression::Constant(c) => Ok(Expression::Constant(c.clone())),
            Expression::ScalarFunction(sf) => sf.deep_copy(registry),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Expression::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_scalar_function(&self) -> Option<&ScalarFunction> {
        match self {
            Expression::ScalarFunction(sf) => Some(sf),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Column(c) => write!(f, "{}", c),
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::ScalarFunction(sf) => write!(f, "{}", sf),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Column> for Expression {
    fn from(column: Column) -> Self {
        Expression::Column(column)
    }
}

impl From<Constant> for Expression {
    fn from(constant: Constant) -> Self {
        Expression::Constant(constant)
    }
}

impl From<ScalarFunction> for Expression {
    fn from(function: ScalarFunction) -> Self {
        Expression::ScalarFunction(function)
    }
}

/// Apply a datum conversion. NULL stays NULL. A failed text-to-number
/// conversion becomes `truncated` plus a warning when the statement allows it.
fn coerce<T>(
    value: &Value,
    ctx: &ExecutionContext,
    convert: impl FnOnce(&Value) -> PrismDBResult<T>,
    truncated: Option<T>,
) -> EvalResult<T> {
    if value.is_null() {
        return Ok(None);
    }
    match convert(value) {
        Ok(v) => Ok(Some(v)),
        Err(PrismDBError::Cast(msg)) if ctx.statement().truncate_as_warning => match truncated {
            Some(zero) => {
                ctx.statement().append_warning(format!("Truncated incorrect value: {}", msg));
                Ok(Some(zero))
            }
            None => Err(PrismDBError::Cast(msg)),
        },
        Err(e) => Err(e),
    }
}

pub(crate) fn value_as_int(value: &Value, ctx: &ExecutionContext) -> EvalResult<i64> {
    coerce(value, ctx, Value::to_i64, Some(0))
}

pub(crate) fn value_as_real(value: &Value, ctx: &ExecutionContext) -> EvalResult<f64> {
    coerce(value, ctx, Value::to_f64, Some(0.0))
}

pub(crate) fn value_as_decimal(value: &Value, ctx: &ExecutionContext) -> EvalResult<Decimal> {
    coerce(value, ctx, Value::to_decimal, Some(Decimal::ZERO))
}

pub(crate) fn value_as_string(value: &Value, ctx: &ExecutionContext) -> EvalResult<String> {
    coerce(value, ctx, Value::to_text, None)
}

pub(crate) fn value_as_time(
    value: &Value,
    ctx: &ExecutionContext,
    target: &LogicalType,
) -> EvalResult<Time> {
    coerce(
        value,
        ctx,
        |v| match v {
            Value::Time(t) => Ok(*t),
            other => other.to_time(target),
        },
        None,
    )
}

pub(crate) fn value_as_duration(value: &Value, ctx: &ExecutionContext) -> EvalResult<Duration> {
    coerce(value, ctx, Value::to_duration, None)
}

pub(crate) fn value_as_json(
    value: &Value,
    ctx: &ExecutionContext,
) -> EvalResult<serde_json::Value> {
    coerce(value, ctx, Value::to_json, None)
}
