//! Date/Time Functions
//!
//! DATE() truncates a temporal value to its day, TIMEDIFF() measures the
//! span between two datetimes or two durations.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::expression::EvalResult;
use crate::expression::function::{
    arg_duration, arg_time, BaseBuiltin, BuiltinFunction, FunctionClass, FunctionRegistry, DATE,
    TIME_DIFF,
};
use crate::types::{EvalType, FieldType, LogicalType, Time, Value};
use chrono::Duration;
use std::any::Any;

/// DATE(expr) - Date part of a date or datetime expression
#[derive(Debug, Clone)]
pub struct DateFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for DateFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::Date)
    }

    fn eval_time(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Time> {
        let time = arg_time(&self.base.args[0], ctx, row)?;
        Ok(time.map(|t| Time::from_datetime(t.datetime, &LogicalType::Date)))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// TIMEDIFF(a, b) - `a - b` as a duration
#[derive(Debug, Clone)]
pub struct TimeDiffFunction {
    base: BaseBuiltin,
    of_durations: bool,
}

impl TimeDiffFunction {
    pub fn new(base: BaseBuiltin) -> PrismDBResult<Self> {
        let (lhs, rhs) = (base.args[0].eval_type(), base.args[1].eval_type());
        let of_durations = match (lhs, rhs) {
            (EvalType::Duration, EvalType::Duration) => true,
            (EvalType::Duration, _) | (_, EvalType::Duration) => {
                return Err(PrismDBError::InvalidArgument(
                    "TIMEDIFF arguments must both be datetimes or both be times".to_string(),
                ))
            }
            _ => false,
        };
        Ok(Self { base, of_durations })
    }
}

impl BuiltinFunction for TimeDiffFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::Duration)
    }

    fn eval_duration(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Duration> {
        let args = &self.base.args;
        if self.of_durations {
            let Some(a) = arg_duration(&args[0], ctx, row)? else {
                return Ok(None);
            };
            let Some(b) = arg_duration(&args[1], ctx, row)? else {
                return Ok(None);
            };
            let diff = a.checked_sub(&b).ok_or_else(|| {
                PrismDBError::Overflow(format!(
                    "TIME value is out of range in 'timediff({}, {})'",
                    args[0], args[1]
                ))
            })?;
            return Ok(Some(diff));
        }
        let Some(a) = arg_time(&args[0], ctx, row)? else {
            return Ok(None);
        };
        let Some(b) = arg_time(&args[1], ctx, row)? else {
            return Ok(None);
        };
        Ok(Some(a.datetime - b.datetime))
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
        DATE,
        FunctionClass::fixed(DATE, 1, |base| Ok(Box::new(DateFunction { base }))),
    );
    registry.register(
        TIME_DIFF,
        FunctionClass::fixed(TIME_DIFF, 2, |base| Ok(Box::new(TimeDiffFunction::new(base)?))),
    );
}
