use pretty_assertions::assert_eq;
use prism_scalar::expression::cast::CastFunction;
use prism_scalar::expression::function::{
    BaseBuiltin, BuiltinFunction, FunctionClass, FunctionFactory, CONCAT, DATE, DIV, EQ, JSON_EXTRACT, PLUS,
    TIME_DIFF,
};
use prism_scalar::expression::scalar_function::FuncName;
use prism_scalar::types::{decode_value, parse_duration};
use prism_scalar::{
    new_function, new_values_function, Column, Constant, ContextRef, ExecutionContext,
    Expression, FieldType, FunctionRegistry, LogicalType, PrismDBError, PrismDBResult,
    ScalarFunction, Schema, SchemaColumn, SessionConfig, Value,
};
use rust_decimal::Decimal;
use std::any::Any;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn schema() -> Schema {
    Schema::new(vec![
        SchemaColumn::new(1, "a", FieldType::bigint()).with_table("t"),
        SchemaColumn::new(2, "b", FieldType::bigint()).with_table("t"),
        SchemaColumn::new(3, "c", FieldType::varchar()).with_table("t"),
    ])
}

fn col(unique_id: i64, name: &str, field_type: FieldType) -> PrismDBResult<Expression> {
    let mut expr = Expression::from(Column::new(unique_id, name, field_type).with_table("t"));
    expr.resolve_indices(&schema())?;
    Ok(expr)
}

fn lit(value: impl Into<Value>) -> Expression {
    Expression::from(Constant::new(value))
}

/// Requested type that leaves the choice to the implementation
fn untyped() -> Option<FieldType> {
    Some(FieldType::unspecified())
}

#[test]
fn test_constant_arguments_fold() -> PrismDBResult<()> {
    init_tracing();
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();

    let expr = new_function(&registry, &ctx, PLUS, Some(FieldType::bigint()), &[lit(2i64), lit(3i64)])?;
    let constant = expr.as_constant().map(|c| c.value.clone());
    assert_eq!(constant, Some(Value::Int(5)));

    // Folding a constant again leaves it alone
    let copy = expr.deep_copy(&registry)?;
    assert!(copy.equal(&expr, &ctx));
    assert_eq!(copy.hash_code(), expr.hash_code());
    Ok(())
}

#[test]
fn test_column_argument_is_not_folded() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let a = col(1, "a", FieldType::bigint())?;

    let expr = new_function(&registry, &ctx, PLUS, Some(FieldType::bigint()), &[a, lit(3i64)])?;
    assert!(expr.as_scalar_function().is_some());
    assert!(!expr.is_correlated());
    assert_eq!(expr.eval(&ctx, &[Value::Int(4), Value::Int(0), Value::Null])?, Value::Int(7));
    assert_eq!(expr.to_string(), "plus(t.a, 3)");
    Ok(())
}

#[test]
fn test_unknown_function() {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let err = new_function(&registry, &ctx, "no_such_fn", Some(FieldType::bigint()), &[])
        .unwrap_err();
    assert!(matches!(err, PrismDBError::FunctionNotFound(name) if name == "no_such_fn"));
}

/// Implementation that leaves the result type to the caller
#[derive(Debug, Clone)]
struct Untyped {
    base: BaseBuiltin,
}

impl BuiltinFunction for Untyped {
    fn base(&self) -> &BaseBuiltin {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseBuiltin {
        &mut self.base
    }

    fn clone_box(&self) -> Box<dyn BuiltinFunction> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_missing_return_type() {
    let ctx = ExecutionContext::shared();
    let mut registry = FunctionRegistry::new();
    registry.register(
        "untyped",
        FunctionClass::new("untyped", 0, None, |base| Ok(Box::new(Untyped { base }))),
    );

    let err = new_function(&registry, &ctx, "untyped", None, &[]).unwrap_err();
    assert!(matches!(err, PrismDBError::MissingReturnType(_)));

    let err = new_function(&registry, &ctx, "untyped", untyped(), &[]).unwrap_err();
    assert!(matches!(err, PrismDBError::MissingReturnType(_)));
}

#[test]
fn test_absent_return_type_fails_for_typed_builtin() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let a = col(1, "a", FieldType::bigint())?;

    let err = new_function(&registry, &ctx, PLUS, None, &[a.clone(), lit(3i64)]).unwrap_err();
    assert!(matches!(err, PrismDBError::MissingReturnType(name) if name == PLUS));
    let err = new_function(&registry, &ctx, PLUS, None, &[lit(2i64), lit(3i64)]).unwrap_err();
    assert!(matches!(err, PrismDBError::MissingReturnType(_)));

    // Any supplied type is overridden by the declared one
    let expr = new_function(&registry, &ctx, PLUS, Some(FieldType::varchar()), &[a, lit(3i64)])?;
    assert_eq!(expr.field_type(), &FieldType::bigint());
    Ok(())
}

#[test]
fn test_structural_equality_and_hash() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let boolean = Some(FieldType::new(LogicalType::Boolean));

    let eq_ab = |registry: &FunctionRegistry| -> PrismDBResult<Expression> {
        new_function(
            registry,
            &ctx,
            EQ,
            boolean.clone(),
            &[col(1, "a", FieldType::bigint())?, col(2, "b", FieldType::bigint())?],
        )
    };
    let first = eq_ab(&registry)?;
    let second = eq_ab(&registry)?;
    assert!(first.equal(&second, &ctx));
    assert!(second.equal(&first, &ctx));
    assert_eq!(first.hash_code(), second.hash_code());

    let eq_ac = new_function(
        &registry,
        &ctx,
        EQ,
        boolean,
        &[col(1, "a", FieldType::bigint())?, col(3, "c", FieldType::varchar())?],
    )?;
    assert!(!first.equal(&eq_ac, &ctx));
    assert_ne!(first.hash_code(), eq_ac.hash_code());
    Ok(())
}

#[test]
fn test_argument_order_changes_hash() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let unfolded = |args: Vec<Expression>| -> PrismDBResult<ScalarFunction> {
        let factory = registry
            .lookup(PLUS)
            .ok_or_else(|| PrismDBError::FunctionNotFound(PLUS.to_string()))?;
        let function = factory.build(args, ctx.clone())?;
        Ok(ScalarFunction {
            func_name: FuncName::new(PLUS),
            ret_type: function.return_type(),
            function,
        })
    };

    let one_two = unfolded(vec![lit(1i64), lit(2i64)])?;
    let two_one = unfolded(vec![lit(2i64), lit(1i64)])?;
    assert_ne!(one_two.hash_code(), two_one.hash_code());
    assert!(!one_two.equal(&two_one, &ctx));

    // The encoding is the value codec over the name and argument encodings
    let fields = decode_value(&one_two.hash_code())?;
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1], Value::Bytes(lit(1i64).hash_code()));
    Ok(())
}

#[test]
fn test_dispatch_matches_typed_evaluators() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let row = [Value::Int(10), Value::Int(4), Value::string("2023-07-14 18:30:00")];
    let a = col(1, "a", FieldType::bigint())?;
    let b = col(2, "b", FieldType::bigint())?;
    let c = col(3, "c", FieldType::varchar())?;

    let int = new_function(&registry, &ctx, PLUS, Some(FieldType::bigint()), &[a.clone(), b.clone()])?;
    assert_eq!(int.eval(&ctx, &row)?, Value::Int(14));
    assert_eq!(int.eval_int(&ctx, &row)?, Some(14));

    let real = new_function(&registry, &ctx, PLUS, untyped(), &[a.clone(), lit(0.5)])?;
    assert_eq!(real.eval(&ctx, &row)?, Value::Double(10.5));
    assert_eq!(real.eval_real(&ctx, &row)?, Some(10.5));

    let decimal = new_function(&registry, &ctx, DIV, untyped(), &[a.clone(), b])?;
    assert_eq!(decimal.field_type(), &FieldType::decimal(28, 4));
    assert_eq!(decimal.eval_decimal(&ctx, &row)?, Some(Decimal::new(25, 1)));
    assert_eq!(decimal.eval(&ctx, &row)?, Value::Decimal(Decimal::new(25, 1)));

    let string = new_function(&registry, &ctx, CONCAT, untyped(), &[c.clone(), lit("!")])?;
    assert_eq!(string.eval_string(&ctx, &row)?, Some("2023-07-14 18:30:00!".to_string()));
    assert_eq!(string.eval(&ctx, &row)?, Value::string("2023-07-14 18:30:00!"));

    let date = new_function(&registry, &ctx, DATE, untyped(), &[c.clone()])?;
    let time = date.eval_time(&ctx, &row)?;
    assert_eq!(time.map(|t| t.to_string()), Some("2023-07-14".to_string()));
    assert_eq!(date.eval(&ctx, &row)?, time.map(Value::Time).unwrap_or(Value::Null));

    let diff = new_function(&registry, &ctx, TIME_DIFF, untyped(), &[c, lit("2023-07-14 18:00:00")])?;
    assert_eq!(diff.eval_duration(&ctx, &row)?, Some(parse_duration("00:30:00")?));
    assert_eq!(diff.eval(&ctx, &row)?, Value::Duration(parse_duration("00:30:00")?));

    let json = new_function(
        &registry,
        &ctx,
        JSON_EXTRACT,
        untyped(),
        &[lit(r#"{"k": [1, 2]}"#), lit("$.k[1]")],
    )?;
    assert_eq!(json.eval(&ctx, &row)?, Value::Json(serde_json::json!(2)));

    // Asking for another class is a typed evaluation error
    let err = int.eval_string(&ctx, &row).unwrap_err();
    assert!(matches!(err.root_cause(), PrismDBError::Type(_)));

    // NULL flows through every class
    let null_row = [Value::Null, Value::Int(1), Value::Null];
    assert_eq!(int.eval_int(&ctx, &null_row)?, None);
    assert_eq!(int.eval(&ctx, &null_row)?, Value::Null);
    assert_eq!(decimal.eval(&ctx, &null_row)?, Value::Null);
    Ok(())
}

#[test]
fn test_unsigned_reinterpretation() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let cast = new_function(
        &registry,
        &ctx,
        "CAST",
        Some(FieldType::unsigned_bigint()),
        &[col(1, "a", FieldType::bigint())?],
    )?;
    assert_eq!(cast.eval(&ctx, &[Value::Int(-1)])?, Value::UInt(18446744073709551615));
    Ok(())
}

#[test]
fn test_deep_copy_is_independent() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let outer = Column::correlated(9, "x", FieldType::bigint());
    outer.set_outer_value(Value::Int(1));
    let expr = new_function(
        &registry,
        &ctx,
        PLUS,
        Some(FieldType::bigint()),
        &[Expression::from(outer.clone()), col(1, "a", FieldType::bigint())?],
    )?;

    let copy = expr.deep_copy(&registry)?;
    assert!(copy.equal(&expr, &ctx));
    assert_eq!(copy.hash_code(), expr.hash_code());

    outer.set_outer_value(Value::Int(100));
    assert_eq!(expr.eval(&ctx, &[Value::Int(1)])?, Value::Int(101));
    assert_eq!(copy.eval(&ctx, &[Value::Int(1)])?, Value::Int(2));

    let values = new_values_function(0, FieldType::bigint(), &ctx);
    let values_copy = values.deep_copy(&registry)?;
    assert!(values_copy.equal(&values, &ctx));
    Ok(())
}

#[test]
fn test_cast_deep_copy_is_independent() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let cast = new_function(
        &registry,
        &ctx,
        "CAST",
        Some(FieldType::unsigned_bigint()),
        &[col(1, "a", FieldType::bigint())?],
    )?;

    let mut copy = cast.deep_copy(&registry)?;
    let copied = copy
        .as_scalar_function()
        .ok_or_else(|| PrismDBError::Internal("cast was folded".to_string()))?;
    assert_eq!(copied.func_name.lower, "cast");
    assert_eq!(copied.ret_type, FieldType::unsigned_bigint());
    let target = copied
        .function
        .as_any()
        .downcast_ref::<CastFunction>()
        .map(|f| f.target().clone());
    assert_eq!(target, Some(FieldType::unsigned_bigint()));
    assert!(copy.equal(&cast, &ctx));
    assert_eq!(copy.hash_code(), cast.hash_code());

    // Re-resolving the copy against a wider schema leaves the original's slot alone
    let wider = Schema::new(vec![
        SchemaColumn::new(7, "z", FieldType::bigint()),
        SchemaColumn::new(1, "a", FieldType::bigint()),
    ]);
    copy.resolve_indices(&wider)?;
    let row = [Value::Int(-1), Value::Int(5)];
    assert_eq!(copy.eval(&ctx, &row)?, Value::UInt(5));
    assert_eq!(cast.eval(&ctx, &row)?, Value::UInt(u64::MAX));
    Ok(())
}

#[test]
fn test_decorrelate_then_resolve() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let outer = Expression::from(Column::correlated(2, "b", FieldType::bigint()));
    let mut expr = new_function(
        &registry,
        &ctx,
        PLUS,
        Some(FieldType::bigint()),
        &[col(1, "a", FieldType::bigint())?, outer],
    )?;
    assert!(expr.is_correlated());

    expr.decorrelate(&Schema::new(vec![SchemaColumn::new(7, "z", FieldType::bigint())]));
    assert!(expr.is_correlated());

    expr.decorrelate(&schema());
    assert!(!expr.is_correlated());
    expr.resolve_indices(&schema())?;
    assert_eq!(expr.eval(&ctx, &[Value::Int(1), Value::Int(2), Value::Null])?, Value::Int(3));

    let err = expr
        .resolve_indices(&Schema::new(vec![SchemaColumn::new(1, "a", FieldType::bigint())]))
        .unwrap_err();
    assert!(err.to_string().contains("argument 1 of 'plus'"));
    assert!(matches!(err.root_cause(), PrismDBError::Internal(_)));
    Ok(())
}

#[test]
fn test_marshal_json() -> PrismDBResult<()> {
    let ctx = ExecutionContext::shared();
    let registry = FunctionRegistry::with_builtins();
    let expr = new_function(
        &registry,
        &ctx,
        "Concat",
        untyped(),
        &[col(3, "c", FieldType::varchar())?, lit("x")],
    )?;
    let json = serde_json::to_string(&expr).map_err(|e| PrismDBError::Internal(e.to_string()))?;
    assert_eq!(json, r#""concat(t.c, 'x')""#);
    Ok(())
}

#[test]
fn test_session_settings_reach_evaluation() -> PrismDBResult<()> {
    let registry = FunctionRegistry::with_builtins();
    let boolean = Some(FieldType::new(LogicalType::Boolean));

    let mut config = SessionConfig::default();
    config.set("case_insensitive_collation", "on")?;
    let ctx: ContextRef = Arc::new(ExecutionContext::new(config));
    let expr = new_function(&registry, &ctx, EQ, boolean.clone(), &[lit("abc"), lit("ABC")])?;
    assert_eq!(expr.as_constant().map(|c| c.value.clone()), Some(Value::Int(1)));

    let strict = ExecutionContext::shared();
    let expr = new_function(&registry, &strict, EQ, boolean, &[lit("abc"), lit("ABC")])?;
    assert_eq!(expr.as_constant().map(|c| c.value.clone()), Some(Value::Int(0)));
    Ok(())
}
