//! Interval Operator Tests
//!
//! Tests for: membership with open/closed bounds, Collapse, Expand,
//! PointFrom, Union, Intersect and timing relations between intervals,
//! plus uncertain durations that come back as intervals.

use cqlpath_ast::{
    BinaryOp, DateLiteral, DateTimeLiteral, Expression, IntervalOp, TemporalPrecision,
    TimeLiteral, UnaryOp,
};
use cqlpath_eval::{CqlEngine, EngineConfig, EvalError, EvaluationContext};
use cqlpath_types::{CqlInterval, CqlTime, CqlType, CqlValue};
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;

use crate::{binary, eval, int, try_eval};

fn interval(low: i32, low_closed: bool, high: i32, high_closed: bool) -> Expression {
    Expression::interval(int(low), low_closed, int(high), high_closed)
}

fn closed(low: i32, high: i32) -> Expression {
    interval(low, true, high, true)
}

fn closed_value(low: i32, high: i32) -> CqlValue {
    CqlValue::Interval(CqlInterval::closed(
        CqlType::Integer,
        CqlValue::Integer(low),
        CqlValue::Integer(high),
    ))
}

#[rstest]
#[case(5, closed(1, 10), true)]
#[case(10, interval(1, true, 10, false), false)]
#[case(1, interval(1, false, 10, false), false)]
#[case(1, closed(1, 10), true)]
fn test_point_membership(#[case] point: i32, #[case] range: Expression, #[case] result: bool) {
    assert_eq!(eval(&binary(BinaryOp::In, int(point), range)), CqlValue::Boolean(result));
}

#[test]
fn test_null_point_membership_is_unknown() {
    assert_eq!(eval(&binary(BinaryOp::In, Expression::null(), closed(1, 10))), CqlValue::Null);
}

#[test]
fn test_point_from_unit_interval() {
    assert_eq!(
        eval(&Expression::unary(UnaryOp::PointFrom, closed(5, 5))),
        CqlValue::Integer(5)
    );
}

#[test]
fn test_collapse_is_idempotent() {
    let intervals = Expression::list(vec![closed(1, 3), closed(2, 5), closed(8, 9)]);
    let once = Expression::unary(UnaryOp::Collapse, intervals);
    let twice = Expression::unary(UnaryOp::Collapse, once.clone());
    let expected = CqlValue::list(vec![closed_value(1, 5), closed_value(8, 9)]);
    assert_eq!(eval(&once), expected);
    assert_eq!(eval(&twice), expected);
}

#[test]
fn test_collapse_merges_adjacent_integers() {
    let intervals = Expression::list(vec![closed(1, 3), closed(4, 6)]);
    assert_eq!(
        eval(&Expression::unary(UnaryOp::Collapse, intervals)),
        CqlValue::list(vec![closed_value(1, 6)])
    );
}

#[test]
fn test_union_of_disjoint_intervals_is_null() {
    assert_eq!(eval(&binary(BinaryOp::Union, closed(1, 2), closed(5, 6))), CqlValue::Null);
    assert_eq!(eval(&binary(BinaryOp::Union, closed(1, 3), closed(3, 6))), closed_value(1, 6));
}

#[test]
fn test_intersect() {
    assert_eq!(
        eval(&binary(BinaryOp::Intersect, closed(1, 5), closed(3, 8))),
        closed_value(3, 5)
    );
}

#[rstest]
#[case(IntervalOp::Overlaps, closed(1, 5), closed(5, 9), true)]
#[case(IntervalOp::Meets, closed(1, 4), closed(5, 9), true)]
#[case(IntervalOp::Before, closed(1, 4), closed(5, 9), true)]
#[case(IntervalOp::Includes, closed(1, 9), closed(3, 4), true)]
#[case(IntervalOp::IncludedIn, closed(1, 9), closed(3, 4), false)]
fn test_interval_relations(
    #[case] op: IntervalOp,
    #[case] left: Expression,
    #[case] right: Expression,
    #[case] result: bool,
) {
    assert_eq!(eval(&Expression::timing(op, None, left, right)), CqlValue::Boolean(result));
}

#[test]
fn test_expand_integer_interval() {
    let expr = Expression::Expand {
        operand: Box::new(Expression::list(vec![closed(1, 3)])),
        per: None,
    };
    let CqlValue::List(expanded) = eval(&expr) else {
        panic!("expected a list");
    };
    assert_eq!(expanded.len(), 3);
}

#[test]
fn test_expand_respects_limit() {
    let engine = CqlEngine::with_config(EngineConfig::default().with_max_expansion_size(10));
    let expr = Expression::Expand {
        operand: Box::new(Expression::list(vec![closed(1, 1000)])),
        per: None,
    };
    let result = engine.evaluate(&expr, &mut EvaluationContext::new());
    assert!(matches!(result, Err(EvalError::ExpansionLimit { .. })));
}

#[test]
fn test_inverted_selector_is_empty() {
    let inverted = closed(10, 1);
    assert!(matches!(try_eval(&inverted).unwrap(), CqlValue::Interval(_)));
    assert_eq!(eval(&binary(BinaryOp::In, int(5), inverted.clone())), CqlValue::Boolean(false));
    assert_eq!(eval(&binary(BinaryOp::Contains, inverted, int(10))), CqlValue::Boolean(false));
}

#[test]
fn test_expand_time_near_midnight() {
    let hours = Expression::interval(
        Expression::time(TimeLiteral::new(22)),
        true,
        Expression::time(TimeLiteral::new(23)),
        true,
    );
    let expr = Expression::Expand {
        operand: Box::new(hours),
        per: None,
    };
    assert_eq!(
        eval(&expr),
        CqlValue::list(vec![
            CqlValue::Time(CqlTime::hour_only(22)),
            CqlValue::Time(CqlTime::hour_only(23)),
        ])
    );
}

#[test]
fn test_expand_datetime_at_end_of_range() {
    let hour = |h| {
        Expression::datetime(
            DateTimeLiteral::new(DateLiteral::new(9999).with_month(12).with_day(31))
                .with_time(h, None, None)
                .with_offset(0),
        )
    };
    let expr = Expression::Expand {
        operand: Box::new(Expression::interval(hour(22), true, hour(23), true)),
        per: None,
    };
    let CqlValue::List(expanded) = eval(&expr) else {
        panic!("expected a list");
    };
    assert_eq!(expanded.len(), 2);
}

#[test]
fn test_expand_per_finer_than_precision_is_empty() {
    let months = Expression::interval(
        Expression::date(2024, Some(1), None),
        true,
        Expression::date(2024, Some(3), None),
        true,
    );
    let expr = Expression::Expand {
        operand: Box::new(months),
        per: Some(Box::new(Expression::quantity(Decimal::ONE, "day"))),
    };
    assert_eq!(eval(&expr), CqlValue::list(Vec::new()));
}

#[test]
fn test_years_between_mixed_precision_is_uncertain() {
    let expr = Expression::DurationBetween {
        precision: TemporalPrecision::Year,
        low: Box::new(Expression::date(2000, Some(6), Some(15))),
        high: Box::new(Expression::date(2024, None, None)),
    };
    assert_eq!(eval(&expr), closed_value(23, 24));
}
