//! Arithmetic, comparison and logical operators

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::ExecutionContext;
use crate::expression::expression::{
    value_as_decimal, value_as_json, value_as_real, value_as_string, EvalResult, Expression,
};
use crate::expression::function::{
    arg_decimal, arg_int, arg_real, BaseBuiltin, BuiltinFunction, FunctionClass,
    FunctionRegistry, DIV, EQ, GE, GT, IS_NULL, LE, LOGIC_AND, LOGIC_OR, LT, MINUS, MUL, NE,
    PLUS, UNARY_NOT,
};
use crate::types::{EvalType, FieldType, LogicalType, TypeClass, TypeUtils, Value};
use rust_decimal::Decimal;
use std::any::Any;
use std::cmp::Ordering;

/// Extra fractional digits a division adds to its dividend's scale
const DIV_PRECISION_INCREMENT: u8 = 4;
const MAX_DECIMAL_DIGITS: u8 = 28;

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn name(&self) -> &'static str {
        match self {
            ArithmeticOp::Plus => PLUS,
            ArithmeticOp::Minus => MINUS,
            ArithmeticOp::Mul => MUL,
            ArithmeticOp::Div => DIV,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Signedness of the two integer operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntOperands {
    IntInt,
    IntUint,
    UintInt,
    UintUint,
}

fn int_operands_mapper(lhs_is_unsigned: bool, rhs_is_unsigned: bool) -> IntOperands {
    match (lhs_is_unsigned, rhs_is_unsigned) {
        (false, false) => IntOperands::IntInt,
        (false, true) => IntOperands::IntUint,
        (true, false) => IntOperands::UintInt,
        (true, true) => IntOperands::UintUint,
    }
}

impl IntOperands {
    /// Widen both operands, reading unsigned ones back out of their i64 bits
    fn widen(self, a: i64, b: i64) -> (i128, i128) {
        let unsigned = |v: i64| v as u64 as i128;
        match self {
            IntOperands::IntInt => (a as i128, b as i128),
            IntOperands::IntUint => (a as i128, unsigned(b)),
            IntOperands::UintInt => (unsigned(a), b as i128),
            IntOperands::UintUint => (unsigned(a), unsigned(b)),
        }
    }
}

fn decimal_scale(field_type: &FieldType) -> u8 {
    match field_type.logical_type {
        LogicalType::Decimal { scale, .. } => scale,
        _ => 0,
    }
}

/// `a + b`, `a - b`, `a * b`, `a / b`. The result class follows the
/// operands: integers stay integers (division excepted), any real operand
/// or string operand makes the result a double.
#[derive(Debug, Clone)]
pub struct ArithmeticFunction {
    base: BaseBuiltin,
    op: ArithmeticOp,
    operands: IntOperands,
    ret_type: FieldType,
}

impl ArithmeticFunction {
    pub fn new(base: BaseBuiltin, op: ArithmeticOp) -> PrismDBResult<Self> {
        let (lhs, rhs) = (base.args[0].field_type(), base.args[1].field_type());
        let ret_type = match TypeUtils::common_class(lhs, rhs) {
            TypeClass::Integer if op == ArithmeticOp::Div => {
                FieldType::decimal(MAX_DECIMAL_DIGITS, DIV_PRECISION_INCREMENT)
            }
            TypeClass::Integer if lhs.is_unsigned() || rhs.is_unsigned() => {
                FieldType::unsigned_bigint()
            }
            TypeClass::Integer => FieldType::bigint(),
            TypeClass::Decimal => {
                let (l, r) = (decimal_scale(lhs), decimal_scale(rhs));
                let scale = match op {
                    ArithmeticOp::Plus | ArithmeticOp::Minus => l.max(r),
                    ArithmeticOp::Mul => l.saturating_add(r),
                    ArithmeticOp::Div => l.saturating_add(DIV_PRECISION_INCREMENT),
                };
                FieldType::decimal(MAX_DECIMAL_DIGITS, scale.min(MAX_DECIMAL_DIGITS))
            }
            TypeClass::Real | TypeClass::String => FieldType::double(),
            TypeClass::Json => {
                return Err(PrismDBError::Type(format!(
                    "Arithmetic '{}' is not defined on JSON values",
                    op.symbol()
                )))
            }
        };
        let operands = int_operands_mapper(lhs.is_unsigned(), rhs.is_unsigned());
        Ok(Self {
            base,
            op,
            operands,
            ret_type,
        })
    }

    pub fn op(&self) -> ArithmeticOp {
        self.op
    }

    fn describe(&self) -> String {
        format!(
            "({} {} {})",
            self.base.args[0],
            self.op.symbol(),
            self.base.args[1]
        )
    }

    fn overflow<T>(&self, ctx: &ExecutionContext, wrapped: T) -> PrismDBResult<T> {
        let message = format!("{} value is out of range in '{}'", self.ret_type, self.describe());
        if ctx.statement().fail_on_overflow {
            return Err(PrismDBError::Overflow(message));
        }
        ctx.statement().append_warning(message);
        Ok(wrapped)
    }

    fn division_by_zero<T>(&self, ctx: &ExecutionContext) -> EvalResult<T> {
        ctx.statement()
            .append_warning(PrismDBError::DivisionByZero.to_string());
        Ok(None)
    }

    /// Integer arithmetic over the widened operands. The result must fit
    /// the signed or unsigned 64-bit range of the return type.
    fn eval_integer(&self, ctx: &ExecutionContext, a: i64, b: i64) -> PrismDBResult<i64> {
        let (a, b) = self.operands.widen(a, b);
        let checked = match self.op {
            ArithmeticOp::Plus => a.checked_add(b),
            ArithmeticOp::Minus => a.checked_sub(b),
            ArithmeticOp::Mul => a.checked_mul(b),
            ArithmeticOp::Div => a.checked_div(b),
        };
        // Unsigned results travel as their i64 bit pattern
        let in_range = if self.ret_type.is_unsigned() {
            checked.and_then(|v| u64::try_from(v).ok()).map(|v| v as i64)
        } else {
            checked.and_then(|v| i64::try_from(v).ok())
        };
        match in_range {
            Some(v) => Ok(v),
            None => {
                let wrapped = match self.op {
                    ArithmeticOp::Plus => a.wrapping_add(b),
                    ArithmeticOp::Minus => a.wrapping_sub(b),
                    ArithmeticOp::Mul => a.wrapping_mul(b),
                    ArithmeticOp::Div => a.wrapping_div(b),
                };
                self.overflow(ctx, wrapped as i64)
            }
        }
    }
}

impl BuiltinFunction for ArithmeticFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        self.ret_type.clone()
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        let Some(a) = arg_int(&self.base.args[0], ctx, row)? else {
            return Ok(None);
        };
        let Some(b) = arg_int(&self.base.args[1], ctx, row)? else {
            return Ok(None);
        };
        if self.op == ArithmeticOp::Div && b == 0 {
            return self.division_by_zero(ctx);
        }
        Ok(Some(self.eval_integer(ctx, a, b)?))
    }

    fn eval_real(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<f64> {
        let Some(a) = arg_real(&self.base.args[0], ctx, row)? else {
            return Ok(None);
        };
        let Some(b) = arg_real(&self.base.args[1], ctx, row)? else {
            return Ok(None);
        };
        let result = match self.op {
            ArithmeticOp::Plus => a + b,
            ArithmeticOp::Minus => a - b,
            ArithmeticOp::Mul => a * b,
            ArithmeticOp::Div if b == 0.0 => return self.division_by_zero(ctx),
            ArithmeticOp::Div => a / b,
        };
        if !result.is_finite() {
            return Err(PrismDBError::Overflow(format!(
                "DOUBLE value is out of range in '{}'",
                self.describe()
            )));
        }
        Ok(Some(result))
    }

    fn eval_decimal(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Decimal> {
        let Some(a) = arg_decimal(&self.base.args[0], ctx, row)? else {
            return Ok(None);
        };
        let Some(b) = arg_decimal(&self.base.args[1], ctx, row)? else {
            return Ok(None);
        };
        let result = match self.op {
            ArithmeticOp::Plus => a.checked_add(b),
            ArithmeticOp::Minus => a.checked_sub(b),
            ArithmeticOp::Mul => a.checked_mul(b),
            ArithmeticOp::Div if b.is_zero() => return self.division_by_zero(ctx),
            ArithmeticOp::Div => a.checked_div(b),
        };
        let result = result.ok_or_else(|| {
            PrismDBError::Overflow(format!(
                "DECIMAL value is out of range in '{}'",
                self.describe()
            ))
        })?;
        Ok(Some(result.round_dp(decimal_scale(&self.ret_type) as u32)))
    }

    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        let same_op = other
            .as_any()
            .downcast_ref::<ArithmeticFunction>()
            .is_some_and(|o| o.op == self.op);
        same_op && self.args().iter().zip(other.args()).all(|(a, b)| a.equal(b, ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Eq => EQ,
            CompareOp::Ne => NE,
            CompareOp::Lt => LT,
            CompareOp::Le => LE,
            CompareOp::Gt => GT,
            CompareOp::Ge => GE,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Compares both operands in their common class; NULL if either is NULL.
#[derive(Debug, Clone)]
pub struct CompareFunction {
    base: BaseBuiltin,
    op: CompareOp,
    class: TypeClass,
}

impl CompareFunction {
    pub fn new(base: BaseBuiltin, op: CompareOp) -> PrismDBResult<Self> {
        let class =
            TypeUtils::common_class(base.args[0].field_type(), base.args[1].field_type());
        Ok(Self { base, op, class })
    }

    /// Operand value converted into the comparison class
    fn operand(&self, idx: usize, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Value> {
        let value = self.base.args[idx].eval(ctx, row)?;
        let converted = match self.class {
            TypeClass::Integer => Some(value).filter(|v| !v.is_null()),
            TypeClass::Real => value_as_real(&value, ctx)?.map(Value::Double),
            TypeClass::Decimal => value_as_decimal(&value, ctx)?.map(Value::Decimal),
            TypeClass::Json => value_as_json(&value, ctx)?.map(Value::Json),
            TypeClass::String => match value {
                Value::Null => None,
                Value::Time(_) | Value::Duration(_) => Some(value),
                other => value_as_string(&other, ctx)?.map(Value::String),
            },
        };
        Ok(converted)
    }
}

impl BuiltinFunction for CompareFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::Boolean)
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        let Some(a) = self.operand(0, ctx, row)? else {
            return Ok(None);
        };
        let Some(b) = self.operand(1, ctx, row)? else {
            return Ok(None);
        };
        let ordering = a.compare(&b, ctx.statement().case_insensitive_collation)?;
        Ok(Some(self.op.holds(ordering) as i64))
    }

    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        let same_op = other
            .as_any()
            .downcast_ref::<CompareFunction>()
            .is_some_and(|o| o.op == self.op);
        same_op && self.args().iter().zip(other.args()).all(|(a, b)| a.equal(b, ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Truth value of an argument: non-zero is true
fn eval_truth(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<bool> {
    match arg.eval_type() {
        EvalType::Int => Ok(arg_int(arg, ctx, row)?.map(|v| v != 0)),
        EvalType::Decimal => Ok(arg_decimal(arg, ctx, row)?.map(|v| !v.is_zero())),
        _ => Ok(arg_real(arg, ctx, row)?.map(|v| v != 0.0)),
    }
}

/// Logical connectives under three-valued logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone)]
pub struct LogicFunction {
    base: BaseBuiltin,
    op: LogicOp,
}

impl LogicFunction {
    pub fn new(base: BaseBuiltin, op: LogicOp) -> Self {
        Self { base, op }
    }
}

impl BuiltinFunction for LogicFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::Boolean)
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        let args = &self.base.args;
        let result = match self.op {
            LogicOp::Not => eval_truth(&args[0], ctx, row)?.map(|v| !v),
            LogicOp::And => match eval_truth(&args[0], ctx, row)? {
                Some(false) => Some(false),
                lhs => match (lhs, eval_truth(&args[1], ctx, row)?) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
            },
            LogicOp::Or => match eval_truth(&args[0], ctx, row)? {
                Some(true) => Some(true),
                lhs => match (lhs, eval_truth(&args[1], ctx, row)?) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
            },
        };
        Ok(result.map(i64::from))
    }

    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        let same_op = other
            .as_any()
            .downcast_ref::<LogicFunction>()
            .is_some_and(|o| o.op == self.op);
        same_op && self.args().iter().zip(other.args()).all(|(a, b)| a.equal(b, ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `isnull(x)`: 1 when x is NULL, never NULL itself
#[derive(Debug, Clone)]
pub struct IsNullFunction {
    base: BaseBuiltin,
}

impl BuiltinFunction for IsNullFunction {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn return_type(&self) -> FieldType {
        FieldType::new(LogicalType::Boolean).with_not_null()
    }

    fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        let value = self.base.args[0].eval(ctx, row)?;
        Ok(Some(value.is_null() as i64))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    for op in [
        ArithmeticOp::Plus,
        ArithmeticOp::Minus,
        ArithmeticOp::Mul,
        ArithmeticOp::Div,
    ] {
        registry.register(
            op.name(),
            FunctionClass::fixed(op.name(), 2, move |base| {
                Ok(Box::new(ArithmeticFunction::new(base, op)?))
            }),
        );
    }
    for op in [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ] {
        registry.register(
            op.name(),
            FunctionClass::fixed(op.name(), 2, move |base| {
                Ok(Box::new(CompareFunction::new(base, op)?))
            }),
        );
    }
    registry.register(
        LOGIC_AND,
        FunctionClass::fixed(LOGIC_AND, 2, |base| {
            Ok(Box::new(LogicFunction::new(base, LogicOp::And)))
        }),
    );
    registry.register(
        LOGIC_OR,
        FunctionClass::fixed(LOGIC_OR, 2, |base| {
            Ok(Box::new(LogicFunction::new(base, LogicOp::Or)))
        }),
    );
    registry.register(
        UNARY_NOT,
        FunctionClass::fixed(UNARY_NOT, 1, |base| {
            Ok(Box::new(LogicFunction::new(base, LogicOp::Not)))
        }),
    );
    registry.register(
        IS_NULL,
        FunctionClass::fixed(IS_NULL, 1, |base| Ok(Box::new(IsNullFunction { base }))),
    );
}
