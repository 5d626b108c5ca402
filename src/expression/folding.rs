//! Constant folding at construction time

use crate::common::error::PrismDBResult;
use crate::expression::constant::Constant;
use crate::expression::expression::Expression;
use crate::expression::scalar_function::ScalarFunction;

/// Replace a deterministic function over constant arguments by its value.
/// Evaluation errors surface here, at construction, instead of per row.
pub fn fold_constant(sf: ScalarFunction) -> PrismDBResult<Expression> {
    let foldable =
        sf.function.is_deterministic() && sf.args().iter().all(Expression::is_constant);
    if !foldable {
        return Ok(Expression::ScalarFunction(sf));
    }

    let ctx = sf.function.context().clone();
    let value = sf.eval(&ctx, &[])?;
    tracing::debug!(function = %sf, value = %value, "folded constant");
    Ok(Expression::Constant(Constant::with_type(value, sf.ret_type)))
}

/// Fold the root of `expr` if it is a function; other expressions are
/// returned as they are.
pub fn fold_expression(expr: Expression) -> PrismDBResult<Expression> {
    match expr {
        Expression::ScalarFunction(sf) => fold_constant(sf),
        other => Ok(other),
    }
}
