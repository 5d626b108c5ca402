//! CAST(expr AS type)
//!
//! Cast is a conversion operator rather than a catalog function, so it is
//! built by name outside the registry.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::expression::{
    value_as_decimal, value_as_duration, value_as_int, value_as_json, value_as_real,
    value_as_string, value_as_time, EvalResult,
};
use crate::expression::function::{BaseBuiltin, BuiltinFunction};
use crate::types::{FieldType, LogicalType, Time, TypeClass, Value};
use chrono::Duration;
use rust_decimal::Decimal;
use std::any::Any;

#[derive(Debug, Clone)]
pub struct CastFunction {
    base: BaseBuiltin,
    target: FieldType,
}

impl CastFunction {
    pub fn new(base: BaseBuiltin, target: FieldType) -> PrismDBResult<Self> {
        if base.args.len() != 1 {
            return Err(PrismDBError::InvalidArgument(format!(
                "CAST takes one argument, got {}",
                base.args.len()
            )));
        }
        match target.logical_type {
            LogicalType::Unspecified | LogicalType::Null => {
                return Err(PrismDBError::Type(format!("Cannot cast to {}", target)))
            }
            LogicalType::Decimal { precision, scale } => {
                LogicalType::validate_decimal(precision, scale)?
            }
            _ => {}
        }
        Ok(Self { base, target })
    }

    pub fn target(&self) -> &FieldType {
        &self.target
    }

    /// Argument value converted into the target type
    fn cast_value(&self, ctx: &ExecutionContext, row: &[Value]) -> PrismDBResult<Value> {
        let value = self.base.args[0].eval(ctx, row)?;
        match value.convert_to(&self.target) {
            Err(PrismDBError::Cast(msg)) if ctx.statement().truncate_as_warning => {
                let zero = match self.target.type_class() {
                    TypeClass::Integer => Value::Int(0),
                    TypeClass::Real => Value::Double(0.0),
                    TypeClass::Decimal => Value::Decimal(Decimal::ZERO),
                    _ => return Err(PrismDBError::Cast(msg)),
                };
                ctx.statement()
                    .append_warning(format!("Truncated incorrect value: {}", msg));
                Ok(zero)
            }
            other => other,
        }
    }
}

impl BuiltinFunction for CastFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        self.target.clone()
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        value_as_int(&self.cast_value(ctx, row)?, ctx)
    }

    fn eval_real(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<f64> {
        value_as_real(&self.cast_value(ctx, row)?, ctx)
    }

    fn eval_decimal(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Decimal> {
        value_as_decimal(&self.cast_value(ctx, row)?, ctx)
    }

    fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        value_as_string(&self.cast_value(ctx, row)?, ctx)
    }

    fn eval_time(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Time> {
        value_as_time(&self.cast_value(ctx, row)?, ctx, &self.target.logical_type)
    }

    fn eval_duration(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Duration> {
        value_as_duration(&self.cast_value(ctx, row)?, ctx)
    }

    fn eval_json(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<serde_json::Value> {
        value_as_json(&self.cast_value(ctx, row)?, ctx)
    }

    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        other
            .as_any()
            .downcast_ref::<CastFunction>()
            .is_some_and(|o| o.target == self.target && o.base.args[0].equal(&self.base.args[0], ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
