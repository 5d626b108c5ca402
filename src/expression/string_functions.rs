//! String Functions
//!
//! concat, lower, upper and length over the string class.

use crate::common::error::PrismDBResult;
use crate::execution::context::ExecutionContext;
use crate::expression::expression::EvalResult;
use crate::expression::function::{
    arg_string, BaseBuiltin, BuiltinFunction, FunctionClass, FunctionRegistry, CONCAT, LENGTH,
    LOWER, UPPER,
};
use crate::types::{FieldType, LogicalType, Value};
use std::any::Any;

/// CONCAT - Join all arguments; NULL if any argument is NULL
#[derive(Debug, Clone)]
pub struct ConcatFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for ConcatFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::varchar()
    }

    fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        let mut result = String::new();
        for arg in &self.base.args {
            match arg_string(arg, ctx, row)? {
                Some(part) => result.push_str(&part),
                None => return Ok(None),
            }
        }
        Ok(Some(result))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// LOWER / UPPER - Case conversion
#[derive(Debug, Clone)]
pub struct CaseFunction {
    base: BaseBuiltin,
    upper: bool,
}

impl BuiltinFunction for CaseFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::varchar()
    }

    fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        let value = arg_string(&self.base.args[0], ctx, row)?;
        Ok(value.map(|s| if self.upper { s.to_uppercase() } else { s.to_lowercase() }))
    }

    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        other
            .as_any()
            .downcast_ref::<CaseFunction>()
            .is_some_and(|o| o.upper == self.upper && o.base.args[0].equal(&self.base.args[0], ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// LENGTH - Length in bytes
#[derive(Debug, Clone)]
pub struct LengthFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for LengthFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::BigInt)
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        let value = arg_string(&self.base.args[0], ctx, row)?;
        Ok(value.map(|s| s.len() as i64))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn build_case(base: BaseBuiltin, upper: bool) -> PrismDBResult<Box<dyn BuiltinFunction>> {
    Ok(Box::new(CaseFunction { base, upper }))
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(
        CONCAT,
        FunctionClass::new(CONCAT, 1, None, |base| Ok(Box::new(ConcatFunction { base }))),
    );
    registry.register(LOWER, FunctionClass::fixed(LOWER, 1, |base| build_case(base, false)));
    registry.register(UPPER, FunctionClass::fixed(UPPER, 1, |base| build_case(base, true)));
    registry.register(
        LENGTH,
        FunctionClass::fixed(LENGTH, 1, |base| Ok(Box::new(LengthFunction { base }))),
    );
}
