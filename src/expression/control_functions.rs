//! Functions whose result does not follow from their arguments: RAND() and
//! the VALUES(col) reference of ON DUPLICATE KEY UPDATE.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::expression::{
    value_as_decimal, value_as_duration, value_as_int, value_as_json, value_as_real,
    value_as_string, value_as_time, EvalResult,
};
use crate::expression::function::{BaseBuiltin, BuiltinFunction, FunctionClass, FunctionRegistry, RAND};
use crate::types::{FieldType, LogicalType, Time, Value};
use chrono::Duration;
use rust_decimal::Decimal;
use std::any::Any;

/// RAND() - Uniform double in [0, 1)
#[derive(Debug, Clone)]
pub struct RandFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for RandFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::double()
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn eval_real(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<f64> {
        Ok(Some(rand::random::<f64>()))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// VALUES(col) - Slot `offset` of the row being inserted
#[derive(Debug, Clone)]
pub struct ValuesFunction {
    base: BaseBuiltin,
    offset: usize,
}

impl ValuesFunction {
    pub fn new(base: BaseBuiltin, offset: usize) -> Self {
        Self { base, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn insert_value(&self, ctx: &ExecutionContext) -> PrismDBResult<Value> {
        ctx.with_insert_values(|row| {
            let row = row.ok_or_else(|| {
                PrismDBError::Internal("VALUES() used outside of an insert".to_string())
            })?;
            row.get(self.offset).cloned().ok_or_else(|| {
                PrismDBError::Internal(format!(
                    "VALUES() offset {} out of range for a row of {} values",
                    self.offset,
                    row.len()
                ))
            })
        })
    }
}

impl BuiltinFunction for ValuesFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn eval_int(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<i64> {
        value_as_int(&self.insert_value(ctx)?, ctx)
    }

    fn eval_real(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<f64> {
        value_as_real(&self.insert_value(ctx)?, ctx)
    }

    fn eval_decimal(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Decimal> {
        value_as_decimal(&self.insert_value(ctx)?, ctx)
    }

    fn eval_string(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<String> {
        value_as_string(&self.insert_value(ctx)?, ctx)
    }

    fn eval_time(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Time> {
        value_as_time(&self.insert_value(ctx)?, ctx, &LogicalType::DateTime)
    }

    fn eval_duration(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Duration> {
        value_as_duration(&self.insert_value(ctx)?, ctx)
    }

    fn eval_json(&self, ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<serde_json::Value> {
        value_as_json(&self.insert_value(ctx)?, ctx)
    }

    fn equal(&self, other: &dyn BuiltinFunction, _ctx: &ExecutionContext) -> bool {
        other
            .as_any()
            .downcast_ref::<ValuesFunction>()
            .is_some_and(|o| o.offset == self.offset)
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(
        RAND,
        FunctionClass::fixed(RAND, 0, |base| Ok(Box::new(RandFunction { base }))),
    );
}
