//! Date/Time Operator Tests
//!
//! Precision-aware equality and ordering, timing relations between points,
//! durations, component extraction and clock-relative functions.

use chrono::{FixedOffset, TimeZone};
use cqlpath_ast::{
    BinaryOp, DateLiteral, DateTimeLiteral, Expression, IntervalOp, TemporalPrecision,
};
use cqlpath_eval::{CqlEngine, EvaluationContext};
use cqlpath_types::{CqlDate, CqlValue};
use pretty_assertions::assert_eq;

use crate::{binary, call, eval, int};

fn date(year: i32, month: u8, day: u8) -> Expression {
    Expression::date(year, Some(month), Some(day))
}

#[test]
fn test_equality_across_precisions_is_unknown() {
    let year = Expression::date(2024, None, None);
    let month = Expression::date(2024, Some(1), None);
    assert_eq!(eval(&binary(BinaryOp::Equal, year, month)), CqlValue::Null);
}

#[test]
fn test_equality_at_same_precision() {
    assert_eq!(
        eval(&binary(BinaryOp::Equal, date(2024, 1, 1), date(2024, 1, 1))),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_before_on_dates() {
    let expr = Expression::timing(IntervalOp::Before, None, date(2024, 1, 1), date(2024, 6, 15));
    assert_eq!(eval(&expr), CqlValue::Boolean(true));
}

#[test]
fn test_ordering_decided_by_leading_component() {
    // months differ, so the missing day does not matter
    let partial = Expression::date(2024, Some(1), None);
    assert_eq!(
        eval(&binary(BinaryOp::Less, partial, date(2024, 3, 1))),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_years_between() {
    let expr = Expression::DurationBetween {
        precision: TemporalPrecision::Year,
        low: Box::new(date(2000, 6, 16)),
        high: Box::new(date(2024, 6, 15)),
    };
    assert_eq!(eval(&expr), CqlValue::Integer(23));
}

#[test]
fn test_difference_counts_boundaries() {
    let expr = Expression::DifferenceBetween {
        precision: TemporalPrecision::Year,
        low: Box::new(date(2023, 12, 31)),
        high: Box::new(date(2024, 1, 1)),
    };
    assert_eq!(eval(&expr), CqlValue::Integer(1));
}

#[test]
fn test_component_extraction() {
    let expr = Expression::DateTimeComponent {
        precision: TemporalPrecision::Month,
        operand: Box::new(date(2024, 3, 9)),
    };
    assert_eq!(eval(&expr), CqlValue::Integer(3));
}

#[test]
fn test_datetime_literal_with_offset() {
    let literal = DateTimeLiteral::new(DateLiteral::new(2024).with_month(1).with_day(1))
        .with_time(12, Some(0), Some(0))
        .with_offset(60);
    let CqlValue::DateTime(value) = eval(&Expression::datetime(literal)) else {
        panic!("expected a DateTime");
    };
    assert_eq!(value.timezone_offset, Some(60));
    assert_eq!(value.hour, Some(12));
}

#[test]
fn test_date_constructor_function() {
    let expr = call("Date", vec![int(2024), int(2), int(29)]);
    assert_eq!(eval(&expr), CqlValue::Date(CqlDate::new(2024, 2, 29)));
}

#[test]
fn test_clock_functions_use_context_clock() {
    let clock = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 15, 8, 30, 0)
        .unwrap();
    let engine = CqlEngine::new();
    let mut ctx = EvaluationContext::builder().clock(clock).build();
    assert_eq!(
        engine.evaluate(&Expression::Today, &mut ctx).unwrap(),
        CqlValue::Date(CqlDate::new(2024, 6, 15))
    );
    let age = call("CalculateAgeInYears", vec![date(2000, 6, 16)]);
    assert_eq!(engine.evaluate(&age, &mut ctx).unwrap(), CqlValue::Integer(23));
}
