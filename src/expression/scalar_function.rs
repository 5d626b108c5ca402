//! Scalar function expression: a named function applied to argument
//! expressions, plus the construction entry points.

use crate::common::error::{PrismDBError, PrismDBResult};
use crate::execution::context::{ContextRef, ExecutionContext};
use crate::expression::cast::CastFunction;
use crate::expression::control_functions::ValuesFunction;
use crate::expression::expression::{EvalResult, Expression};
use crate::expression::folding::fold_constant;
use crate::expression::function::{BaseBuiltin, BuiltinFunction, FunctionRegistry, CAST, VALUES};
use crate::expression::schema::Schema;
use crate::internal_err;
use crate::types::{encode_to_vec, EvalType, FieldType, Time, Value};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// Function name as written plus its lowercase form used for identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncName {
    pub original: String,
    pub lower: String,
}

impl FuncName {
    pub fn new(name: &str) -> Self {
        Self {
            original: name.to_string(),
            lower: name.to_lowercase(),
        }
    }
}

/// A function application. Owns its implementation, which owns the
/// argument expressions.
#[derive(Debug, Clone)]
pub struct ScalarFunction {
    pub func_name: FuncName,
    pub ret_type: FieldType,
    pub function: Box<dyn BuiltinFunction>,
}

impl ScalarFunction {
    pub fn args(&self) -> &[Expression] {
        self.function.args()
    }

    /// Evaluate into a tagged datum. Dispatches once on the declared type.
    pub fn eval(&self, ctx: &ExecutionContext, row: &[Value]) -> PrismDBResult<Value> {
        let value = match self.ret_type.eval_type() {
            EvalType::Int => {
                let unsigned = self.ret_type.is_unsigned();
                self.eval_int(ctx, row)?.map(|v| {
                    if unsigned {
                        Value::UInt(v as u64)
                    } else {
                        Value::Int(v)
                    }
                })
            }
            EvalType::Real => self.eval_real(ctx, row)?.map(Value::Double),
            EvalType::Decimal => self.eval_decimal(ctx, row)?.map(Value::Decimal),
            EvalType::String => self.eval_string(ctx, row)?.map(Value::String),
            EvalType::Time => self.eval_time(ctx, row)?.map(Value::Time),
            EvalType::Duration => self.eval_duration(ctx, row)?.map(Value::Duration),
            EvalType::Json => self.eval_json(ctx, row)?.map(Value::Json),
        };
        Ok(value.unwrap_or(Value::Null))
    }

    pub fn eval_int(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<i64> {
        self.check_eval_type(EvalType::Int)?;
        self.function
            .eval_int(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_real(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<f64> {
        self.check_eval_type(EvalType::Real)?;
        self.function
            .eval_real(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_decimal(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Decimal> {
        self.check_eval_type(EvalType::Decimal)?;
        self.function
            .eval_decimal(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_string(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<String> {
        self.check_eval_type(EvalType::String)?;
        self.function
            .eval_string(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_time(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Time> {
        self.check_eval_type(EvalType::Time)?;
        self.function
            .eval_time(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_duration(&self, ctx: &ExecutionContext, row: &[Value]) -> EvalResult<Duration> {
        self.check_eval_type(EvalType::Duration)?;
        self.function
            .eval_duration(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    pub fn eval_json(
        &self,
        ctx: &ExecutionContext,
        row: &[Value],
    ) -> EvalResult<serde_json::Value> {
        self.check_eval_type(EvalType::Json)?;
        self.function
            .eval_json(ctx, row)
            .map_err(|e| self.evaluation_error(e))
    }

    fn check_eval_type(&self, requested: EvalType) -> PrismDBResult<()> {
        let declared = self.ret_type.eval_type();
        if declared != requested {
            return Err(self.evaluation_error(PrismDBError::Type(format!(
                "{} result cannot be evaluated as {}",
                self.ret_type, requested
            ))));
        }
        Ok(())
    }

    fn evaluation_error(&self, source: PrismDBError) -> PrismDBError {
        PrismDBError::evaluation(self.func_name.lower.clone(), source)
    }

    /// Name and argument encodings packed with the value codec, so nested
    /// encodings stay unambiguous.
    pub fn hash_code(&self) -> Vec<u8> {
        let name = encode_to_vec(&[Value::string(self.func_name.lower.as_str())]);
        let mut fields = Vec::with_capacity(self.args().len() + 1);
        fields.push(Value::Bytes(name));
        fields.extend(self.args().iter().map(|arg| Value::Bytes(arg.hash_code())));
        encode_to_vec(&fields)
    }

    pub fn equal(&self, other: &ScalarFunction, ctx: &ExecutionContext) -> bool {
        self.func_name.lower == other.func_name.lower
            && self.function.equal(other.function.as_ref(), ctx)
    }

    pub fn is_correlated(&self) -> bool {
        self.args().iter().any(Expression::is_correlated)
    }

    pub fn decorrelate(&mut self, schema: &Schema) {
        for arg in self.function.args_mut() {
            arg.decorrelate(schema);
        }
    }

    pub fn resolve_indices(&mut self, schema: &Schema) -> PrismDBResult<()> {
        let name = &self.func_name.lower;
        for (position, arg) in self.function.args_mut().iter_mut().enumerate() {
            arg.resolve_indices(schema).map_err(|e| {
                PrismDBError::traced(format!("argument {} of '{}'", position, name), e)
            })?;
        }
        Ok(())
    }

    /// Rebuild through the construction paths with copied arguments
    pub fn deep_copy(&self, registry: &FunctionRegistry) -> PrismDBResult<Expression> {
        let args = self
            .args()
            .iter()
            .map(|arg| arg.deep_copy(registry))
            .collect::<PrismDBResult<Vec<_>>>()?;
        let ctx = self.function.context().clone();
        match self.func_name.lower.as_str() {
            CAST => {
                let arg = args
                    .into_iter()
                    .next()
                    .ok_or_else(|| internal_err!("cast function without argument"))?;
                build_cast_function(&ctx, arg, self.ret_type.clone())
            }
            VALUES => {
                let values = self
                    .function
                    .as_any()
                    .downcast_ref::<ValuesFunction>()
                    .ok_or_else(|| internal_err!("values function of unexpected kind"))?;
                Ok(new_values_function(values.offset(), self.ret_type.clone(), &ctx))
            }
            _ => new_function(
                registry,
                &ctx,
                &self.func_name.original,
                Some(self.ret_type.clone()),
                &args,
            ),
        }
    }
}

impl fmt::Display for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func_name.lower)?;
        for (i, arg) in self.args().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

impl Serialize for ScalarFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Build a function expression by name. `cast` is built directly; every
/// other name is resolved through `registry`. The result is folded into a
/// constant when all arguments are constant.
pub fn new_function(
    registry: &FunctionRegistry,
    ctx: &ContextRef,
    name: &str,
    ret_type: Option<FieldType>,
    args: &[Expression],
) -> PrismDBResult<Expression> {
    let func_name = FuncName::new(name);
    let requested = ret_type.ok_or_else(|| PrismDBError::MissingReturnType(name.to_string()))?;
    if func_name.lower == CAST {
        let target = requested;
        let arg = match args {
            [arg] => arg.clone(),
            _ => {
                return Err(PrismDBError::InvalidArgument(format!(
                    "cast takes exactly one argument, got {}",
                    args.len()
                )))
            }
        };
        return build_cast_function(ctx, arg, target);
    }

    let factory = registry
        .lookup(&func_name.lower)
        .ok_or_else(|| PrismDBError::FunctionNotFound(name.to_string()))?;
    let function = factory
        .build(args.to_vec(), ctx.clone())
        .map_err(|e| PrismDBError::argument_construction(func_name.lower.clone(), e))?;

    let declared = function.return_type();
    let ret_type = if declared.is_unspecified() {
        requested
    } else {
        declared
    };
    if ret_type.is_unspecified() {
        return Err(PrismDBError::MissingReturnType(name.to_string()));
    }

    let sf = ScalarFunction {
        func_name,
        ret_type,
        function,
    };
    tracing::trace!(function = %sf, ret_type = %sf.ret_type, "built scalar function");
    fold_constant(sf)
}

/// Build `cast(arg AS target)`
pub fn build_cast_function(
    ctx: &ContextRef,
    arg: Expression,
    target: FieldType,
) -> PrismDBResult<Expression> {
    let function = CastFunction::new(BaseBuiltin::new(vec![arg], ctx.clone()), target.clone())
        .map_err(|e| PrismDBError::argument_construction(CAST, e))?;
    let sf = ScalarFunction {
        func_name: FuncName::new(CAST),
        ret_type: target,
        function: Box::new(function),
    };
    fold_constant(sf)
}

/// Build `values(col)`, reading slot `offset` of the row being inserted
pub fn new_values_function(offset: usize, ret_type: FieldType, ctx: &ContextRef) -> Expression {
    let function = ValuesFunction::new(BaseBuiltin::new(Vec::new(), ctx.clone()), offset);
    Expression::ScalarFunction(ScalarFunction {
        func_name: FuncName::new(VALUES),
        ret_type,
        function: Box::new(function),
    })
}

pub fn scalar_functions_to_exprs(functions: Vec<ScalarFunction>) -> Vec<Expression> {
    functions.into_iter().map(Expression::ScalarFunction).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::context::ExecutionContext;
    use crate::expression::column::Column;
    use crate::expression::constant::Constant;
    use crate::expression::function::{FunctionClass, PLUS};
    use crate::expression::schema::SchemaColumn;
    use crate::types::LogicalType;
    use std::any::Any;

    /// Returns a fixed signed integer whatever its declared type
    #[derive(Debug, Clone)]
    struct FixedFunction {
        base: BaseBuiltin,
        value: i64,
    }

    impl BuiltinFunction for FixedFunction {
        fn base(&self) -> &BaseBuiltin {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BaseBuiltin {
            &mut self.base
        }

        fn is_deterministic(&self) -> bool {
            false
        }

        fn eval_int(&self, _ctx: &ExecutionContext, _row: &[Value]) -> EvalResult<i64> {
            Ok(Some(self.value))
        }

        fn clone_box(&self) -> Box<dyn BuiltinFunction> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::with_builtins();
        registry.register(
            "minus_one",
            FunctionClass::fixed("minus_one", 0, |base| {
                Ok(Box::new(FixedFunction { base, value: -1 }))
            }),
        );
        registry
    }

    fn col(uid: i64, name: &str) -> Expression {
        Expression::from(Column::new(uid, name, FieldType::bigint()))
    }

    fn int(v: i64) -> Expression {
        Expression::from(Constant::new(v))
    }

    #[test]
    fn test_unsigned_reinterpretation() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let expr = new_function(
            &registry(),
            &ctx,
            "minus_one",
            Some(FieldType::unsigned_bigint()),
            &[],
        )?;
        assert_eq!(expr.eval(&ctx, &[])?, Value::UInt(18446744073709551615));
        assert_eq!(expr.eval_int(&ctx, &[])?, Some(-1));
        Ok(())
    }

    #[test]
    fn test_mismatched_evaluator_is_type_error() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let expr = new_function(&registry(), &ctx, PLUS, Some(FieldType::bigint()), &[
            col(1, "a"),
            int(1),
        ])?;
        let err = expr.eval_string(&ctx, &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err.root_cause(), PrismDBError::Type(_)));
        Ok(())
    }

    #[test]
    fn test_display_and_marshal() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let expr = new_function(&registry(), &ctx, "PLUS", Some(FieldType::bigint()), &[
            col(1, "a"),
            int(3),
        ])?;
        assert_eq!(expr.to_string(), "plus(a, 3)");
        let sf = expr.as_scalar_function().ok_or_else(|| internal_err!("not folded"))?;
        assert_eq!(sf.func_name.original, "PLUS");
        let json = serde_json::to_string(sf).map_err(|e| internal_err!(e.to_string()))?;
        assert_eq!(json, "\"plus(a, 3)\"");
        Ok(())
    }

    #[test]
    fn test_resolve_indices_reports_argument() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let mut expr = new_function(&registry(), &ctx, PLUS, Some(FieldType::bigint()), &[
            int(3),
            col(9, "missing"),
        ])?;
        let schema = Schema::new(vec![SchemaColumn::new(1, "a", FieldType::bigint())]);
        let err = expr.resolve_indices(&schema).unwrap_err();
        assert!(err.to_string().starts_with("argument 1 of 'plus'"));
        assert!(matches!(err.root_cause(), PrismDBError::Internal(_)));
        Ok(())
    }

    #[test]
    fn test_absent_return_type_rejected_before_override() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let registry = registry();
        let err = new_function(&registry, &ctx, PLUS, None, &[col(1, "a"), int(3)]).unwrap_err();
        assert!(matches!(err, PrismDBError::MissingReturnType(name) if name == PLUS));

        // An unspecified request still takes the declared type
        let expr = new_function(&registry, &ctx, PLUS, Some(FieldType::unspecified()), &[
            col(1, "a"),
            int(3),
        ])?;
        assert_eq!(expr.field_type(), &FieldType::bigint());
        Ok(())
    }

    #[test]
    fn test_cast_requires_type_and_one_argument() {
        let ctx = ExecutionContext::shared();
        let registry = registry();
        assert!(matches!(
            new_function(&registry, &ctx, "CAST", None, &[int(1)]),
            Err(PrismDBError::MissingReturnType(_))
        ));
        assert!(matches!(
            new_function(&registry, &ctx, CAST, Some(FieldType::double()), &[]),
            Err(PrismDBError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_values_function_deep_copy() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        ctx.set_insert_values(Some(vec![Value::Int(1), Value::string("x")]));
        let expr = new_values_function(1, FieldType::varchar(), &ctx);
        let copy = expr.deep_copy(&registry())?;
        assert!(copy.equal(&expr, &ctx));
        assert_eq!(copy.hash_code(), expr.hash_code());
        assert_eq!(copy.eval(&ctx, &[])?, Value::string("x"));

        let other = new_values_function(0, FieldType::varchar(), &ctx);
        assert!(!other.equal(&expr, &ctx));
        assert_eq!(
            other.field_type().logical_type,
            LogicalType::Varchar
        );
        Ok(())
    }

    #[test]
    fn test_scalar_functions_to_exprs() -> PrismDBResult<()> {
        let ctx = ExecutionContext::shared();
        let expr = new_function(&registry(), &ctx, PLUS, Some(FieldType::bigint()), &[
            col(1, "a"),
            int(3),
        ])?;
        let sf = expr
            .as_scalar_function()
            .cloned()
            .ok_or_else(|| internal_err!("not a function"))?;
        let exprs = scalar_functions_to_exprs(vec![sf.clone(), sf]);
        assert_eq!(exprs.len(), 2);
        assert!(exprs[0].equal(&exprs[1], &ctx));
        Ok(())
    }
}
