//! Function implementation contract and the name-keyed function registry

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::{ContextRef, ExecutionContext};
use crate::expression::expression::{
    value_as_decimal, value_as_duration, value_as_int, value_as_json, value_as_real,
    value_as_string, value_as_time, EvalResult, Expression,
};
use crate::types::{EvalType, FieldType, LogicalType, Time, Value};
use ahash::AHashMap;
use chrono::Duration;
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;

// Function names with special construction paths
pub const CAST: &str = "cast";
pub const VALUES: &str = "values";

// Registered builtins
pub const PLUS: &str = "plus";
pub const MINUS: &str = "minus";
pub const MUL: &str = "mul";
pub const DIV: &str = "div";
pub const EQ: &str = "eq";
pub const NE: &str = "ne";
pub const LT: &str = "lt";
pub const LE: &str = "le";
pub const GT: &str = "gt";
pub const GE: &str = "ge";
pub const LOGIC_AND: &str = "and";
pub const LOGIC_OR: &str = "or";
pub const UNARY_NOT: &str = "not";
pub const IS_NULL: &str = "isnull";
pub const CONCAT: &str = "concat";
pub const LOWER: &str = "lower";
pub const UPPER: &str = "upper";
pub const LENGTH: &str = "length";
pub const DATE: &str = "date";
pub const TIME_DIFF: &str = "timediff";
pub const JSON_EXTRACT: &str = "json_extract";
pub const JSON_TYPE: &str = "json_type";
pub const RAND: &str = "rand";

/// State every function implementation carries: its arguments and the
/// context it was built in.
#[derive(Debug, Clone)]
pub struct BaseBuiltin {
    pub args: Vec<Expression>,
    pub ctx: ContextRef,
}

impl BaseBuiltin {
    pub fn new(args: Vec<Expression>, ctx: ContextRef) -> Self {
        Self { args, ctx }
    }
}

/// Capability contract of a function implementation.
///
/// Only the evaluator matching the declared return type is called by
/// `ScalarFunction`; the others keep their unsupported default.
pub trait BuiltinFunction: fmt::Debug + Send + Sync {
    fn base(&self) -> &BaseBuiltin;

    fn base_mut(&mut self) -> &mut BaseBuiltin;

    fn args(&self) -> &[Expression] {
        &self.base().args
    }

    /// Arguments for in-place rewrites; their number cannot change
    fn args_mut(&mut self) -> &mut [Expression] {
        &mut self.base_mut().args
    }

    fn context(&self) -> &ContextRef {
        &self.base().ctx
    }

    /// Intrinsic result type. `Unspecified` defers to the caller's type.
    fn return_type(&self) -> FieldType {
        FieldType::unspecified()
    }

    /// Whether the result depends only on the arguments
    fn is_deterministic(&self) -> bool {
        true
    }

    fn eval_int(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<i64> {
        Err(unsupported(EvalType::Int))
    }

    fn eval_real(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<f64> {
        Err(unsupported(EvalType::Real))
    }

    fn eval_decimal(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Decimal> {
        Err(unsupported(EvalType::Decimal))
    }

    fn eval_string(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<String> {
        Err(unsupported(EvalType::String))
    }

    fn eval_time(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Time> {
        Err(unsupported(EvalType::Time))
    }

    fn eval_duration(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<Duration> {
        Err(unsupported(EvalType::Duration))
    }

    fn eval_json(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<serde_json::Value> {
        Err(unsupported(EvalType::Json))
    }

    /// Pairwise argument equality; implementations with extra state refine it
    fn equal(&self, other: &dyn BuiltinFunction, ctx: &ExecutionContext) -> bool {
        let (lhs, rhs) = (self.args(), other.args());
        lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| a.equal(b, ctx))
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn BuiltinFunction> {
    fn clone(&self) -> Box<dyn BuiltinFunction> {
        self.clone_box()
    }
}

fn unsupported(eval_type: EvalType) -> PrismDBError {
    PrismDBError::Type(format!("{} evaluation is not supported", eval_type))
}

/// Builds function implementations from bound arguments
pub trait FunctionFactory: Send + Sync {
    fn build(
        &self,
        args: Vec<Expression>,
        ctx: ContextRef,
    ) -> PrismDBResult<Box<dyn BuiltinFunction>>;
}

type Builder = Box<dyn Fn(BaseBuiltin) -> PrismDBResult<Box<dyn BuiltinFunction>> + Send + Sync>;

/// Factory with an arity check in front of a builder
pub struct FunctionClass {
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    builder: Builder,
}

impl FunctionClass {
    /// `max_args == None` accepts any number of arguments from `min_args`
    pub fn new<F>(name: &'static str, min_args: usize, max_args: Option<usize>, builder: F) -> Self
    where
        F: Fn(BaseBuiltin) -> PrismDBResult<Box<dyn BuiltinFunction>> + Send + Sync + 'static,
    {
        Self {
            name,
            min_args,
            max_args,
            builder: Box::new(builder),
        }
    }

    pub fn fixed<F>(name: &'static str, args: usize, builder: F) -> Self
    where
        F: Fn(BaseBuiltin) -> PrismDBResult<Box<dyn BuiltinFunction>> + Send + Sync + 'static,
    {
        Self::new(name, args, Some(args), builder)
    }

    fn verify_args(&self, args: &[Expression]) -> PrismDBResult<()> {
        let count = args.len();
        let too_many = self.max_args.is_some_and(|max| count > max);
        if count < self.min_args || too_many {
            return Err(PrismDBError::InvalidArgument(format!(
                "Incorrect parameter count in the call to native function '{}': got {}",
                self.name, count
            )));
        }
        Ok(())
    }
}

impl FunctionFactory for FunctionClass {
    fn build(
        &self,
        args: Vec<Expression>,
        ctx: ContextRef,
    ) -> PrismDBResult<Box<dyn BuiltinFunction>> {
        self.verify_args(&args)?;
        (self.builder)(BaseBuiltin::new(args, ctx))
    }
}

/// Function registry keyed by lowercase name. Built once, then only read.
pub struct FunctionRegistry {
    functions: AHashMap<String, Box<dyn FunctionFactory>>,
}

impl FunctionRegistry {
    /// Registry without any function
    pub fn new() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Registry holding the builtin catalog
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::expression::operator::register(&mut registry);
        crate::expression::string_functions::register(&mut registry);
        crate::expression::datetime_functions::register(&mut registry);
        crate::expression::json_functions::register(&mut registry);
        crate::expression::control_functions::register(&mut registry);
        tracing::debug!(functions = registry.len(), "function registry initialised");
        registry
    }

    /// Register a factory, replacing any previous one with the same name
    pub fn register(&mut self, name: &str, factory: impl FunctionFactory + 'static) {
        self.functions.insert(name.to_lowercase(), Box::new(factory));
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn FunctionFactory> {
        self.functions.get(&name.to_lowercase()).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    /// Sorted names of every registered function
    pub fn list_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.list_functions())
            .finish()
    }
}

// Argument readers for implementations. A function argument is evaluated
// through its own evaluator and converted when it produces another class;
// leaves convert their datum directly.

fn needs_conversion(arg: &Expression, native: EvalType) -> bool {
    matches!(arg, Expression::ScalarFunction(_)) && arg.eval_type() != native
}

pub fn arg_int(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
    if needs_conversion(arg, EvalType::Int) {
        return value_as_int(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_int(ctx, row)
}

pub fn arg_real(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<f64> {
    if needs_conversion(arg, EvalType::Real) {
        return value_as_real(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_real(ctx, row)
}

pub fn arg_decimal(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Decimal> {
    if needs_conversion(arg, EvalType::Decimal) {
        return value_as_decimal(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_decimal(ctx, row)
}

pub fn arg_string(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
    if needs_conversion(arg, EvalType::String) {
        return value_as_string(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_string(ctx, row)
}

pub fn arg_time(arg: &Expression, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Time> {
    if needs_conversion(arg, EvalType::Time) {
        return value_as_time(&arg.eval(ctx, row)?, ctx, &LogicalType::DateTime);
    }
    arg.eval_time(ctx, row)
}

pub fn arg_duration(
    arg: &Expression,
    ctx: &ExecutionContext,
    row: &[Value],
) -> EvalResult<Duration> {
    if needs_conversion(arg, EvalType::Duration) {
        return value_as_duration(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_duration(ctx, row)
}

pub fn arg_json(
    arg: &Expression,
    ctx: &ExecutionContext,
    row: &[Value],
) -> EvalResult<serde_json::Value> {
    if needs_conversion(arg, EvalType::Json) {
        return value_as_json(&arg.eval(ctx, row)?, ctx);
    }
    arg.eval_json(ctx, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::constant::Constant;

    #[derive(Debug, Clone)]
    struct AnswerFunction {
        base: BaseBuiltin,
    }

    impl BuiltinFunction for AnswerFunction {
        fn base(&self) -> &BaseBuiltin {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BaseBuiltin {
            &mut self.base
        }

        fn eval_int(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<i64> {
            Ok(Some(42))
        }

        fn clone_box(&self) -> Box<dyn BuiltinFunction> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn answer_class() -> FunctionClass {
        FunctionClass::fixed("answer", 0, |base| Ok(Box::new(AnswerFunction { base })))
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let mut registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        registry.register("Answer", answer_class());
        assert!(registry.contains("ANSWER"));
        assert!(registry.lookup("answer").is_some());
        assert!(registry.lookup("question").is_none());
        assert_eq!(registry.list_functions(), vec!["answer"]);
    }

    #[test]
    fn test_arity_check() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let class = answer_class();
        let built = class.build(vec![], ctx.clone())?;
        assert_eq!(built.eval_int(&ctx, &[])?, Some(42));
        assert!(built.eval_real(&ctx, &[]).is_err());
        assert!(built.return_type().is_unspecified());

        let err = class
            .build(vec![Expression::from(Constant::new(1i64))], ctx)
            .unwrap_err();
        assert!(matches!(err, PrismDBError::InvalidArgument(_)));
        Ok(())
    }

    #[test]
    fn test_builtin_catalog() {
        let registry = FunctionRegistry::with_builtins();
        for name in [PLUS, DIV, EQ, LOGIC_AND, CONCAT, DATE, JSON_EXTRACT, RAND] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(!registry.contains(CAST));
        assert!(!registry.contains(VALUES));
    }
}
