//! Operator integration tests
//!
//! These run expression trees through `CqlEngine::evaluate` and check:
//! - Correct computation for the supported input types
//! - Null propagation and three-valued logic
//! - Temporal precision and interval boundary semantics
//! - Aggregate empty-input behavior

mod aggregate;
mod functions;
mod interval;
mod logical;
mod temporal;

use std::str::FromStr;

use cqlpath_ast::{BinaryOp, Expression};
use cqlpath_eval::{CqlEngine, EvalResult, EvaluationContext};
use cqlpath_types::CqlValue;
use rust_decimal::Decimal;

// ============================================================================
// Test Helpers
// ============================================================================

pub fn try_eval(expr: &Expression) -> EvalResult<CqlValue> {
    CqlEngine::new().evaluate(expr, &mut EvaluationContext::new())
}

pub fn eval(expr: &Expression) -> CqlValue {
    try_eval(expr).unwrap()
}

pub fn int(i: i32) -> Expression {
    Expression::integer(i)
}

pub fn ints(values: &[i32]) -> Expression {
    Expression::list(values.iter().copied().map(Expression::integer).collect())
}

pub fn int_values(values: &[i32]) -> CqlValue {
    CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::binary(op, left, right)
}

pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::call(name, args)
}
