//! Aggregate Function Tests
//!
//! Nulls in the input are ignored; an empty input is `Null` except for
//! Count, AllTrue and AnyTrue.

use cqlpath_ast::Expression;
use cqlpath_types::CqlValue;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{call, dec, eval, ints};

fn empty() -> Expression {
    Expression::list(Vec::new())
}

#[test]
fn test_count_of_empty_is_zero() {
    assert_eq!(eval(&call("Count", vec![empty()])), CqlValue::Integer(0));
}

#[rstest]
#[case("Sum")]
#[case("Avg")]
#[case("Min")]
#[case("Max")]
#[case("Median")]
#[case("StdDev")]
fn test_empty_aggregate_is_null(#[case] name: &str) {
    assert_eq!(eval(&call(name, vec![empty()])), CqlValue::Null);
}

#[test]
fn test_nulls_are_ignored() {
    let values = Expression::list(vec![
        Expression::integer(1),
        Expression::null(),
        Expression::integer(3),
    ]);
    assert_eq!(eval(&call("Count", vec![values.clone()])), CqlValue::Integer(2));
    assert_eq!(eval(&call("Sum", vec![values])), CqlValue::Integer(4));
}

#[rstest]
#[case("Sum", CqlValue::Integer(10))]
#[case("Min", CqlValue::Integer(1))]
#[case("Max", CqlValue::Integer(4))]
#[case("Avg", CqlValue::Decimal(dec("2.5")))]
#[case("Median", CqlValue::Decimal(dec("2.5")))]
fn test_numeric_aggregates(#[case] name: &str, #[case] expected: CqlValue) {
    assert_eq!(eval(&call(name, vec![ints(&[3, 1, 4, 2])])), expected);
}

#[test]
fn test_boolean_aggregates_on_empty() {
    assert_eq!(eval(&call("AllTrue", vec![empty()])), CqlValue::Boolean(true));
    assert_eq!(eval(&call("AnyTrue", vec![empty()])), CqlValue::Boolean(false));
}
