//! Logical Operator Tests
//!
//! Three-valued truth tables for and, or, xor, implies and not.

use cqlpath_ast::{BinaryOp, Expression, UnaryOp};
use cqlpath_types::CqlValue;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{binary, eval};

fn truth(value: Option<bool>) -> Expression {
    value.map_or_else(Expression::null, Expression::boolean)
}

fn expected(value: Option<bool>) -> CqlValue {
    CqlValue::from_option_bool(value)
}

#[rstest]
#[case(Some(true), Some(true), Some(true))]
#[case(Some(true), Some(false), Some(false))]
#[case(Some(true), None, None)]
#[case(Some(false), None, Some(false))]
#[case(None, Some(false), Some(false))]
#[case(None, None, None)]
fn test_and_table(#[case] a: Option<bool>, #[case] b: Option<bool>, #[case] result: Option<bool>) {
    assert_eq!(eval(&binary(BinaryOp::And, truth(a), truth(b))), expected(result));
}

#[rstest]
#[case(Some(false), Some(false), Some(false))]
#[case(Some(true), None, Some(true))]
#[case(None, Some(true), Some(true))]
#[case(Some(false), None, None)]
#[case(None, None, None)]
fn test_or_table(#[case] a: Option<bool>, #[case] b: Option<bool>, #[case] result: Option<bool>) {
    assert_eq!(eval(&binary(BinaryOp::Or, truth(a), truth(b))), expected(result));
}

#[rstest]
#[case(Some(true), Some(false), Some(true))]
#[case(Some(true), Some(true), Some(false))]
#[case(Some(true), None, None)]
fn test_xor_table(#[case] a: Option<bool>, #[case] b: Option<bool>, #[case] result: Option<bool>) {
    assert_eq!(eval(&binary(BinaryOp::Xor, truth(a), truth(b))), expected(result));
}

#[rstest]
#[case(Some(false), None, Some(true))]
#[case(None, Some(true), Some(true))]
#[case(Some(true), Some(false), Some(false))]
#[case(Some(true), None, None)]
#[case(None, Some(false), None)]
fn test_implies_table(
    #[case] a: Option<bool>,
    #[case] b: Option<bool>,
    #[case] result: Option<bool>,
) {
    assert_eq!(eval(&binary(BinaryOp::Implies, truth(a), truth(b))), expected(result));
}

#[test]
fn test_not() {
    assert_eq!(
        eval(&Expression::unary(UnaryOp::Not, Expression::boolean(true))),
        CqlValue::Boolean(false)
    );
    assert_eq!(eval(&Expression::unary(UnaryOp::Not, Expression::null())), CqlValue::Null);
}

#[test]
fn test_null_tests_never_yield_null() {
    assert_eq!(
        eval(&Expression::unary(UnaryOp::IsNull, Expression::null())),
        CqlValue::Boolean(true)
    );
    assert_eq!(
        eval(&Expression::unary(UnaryOp::IsTrue, Expression::null())),
        CqlValue::Boolean(false)
    );
}
