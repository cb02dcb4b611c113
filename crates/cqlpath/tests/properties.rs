//! Engine Property Tests
//!
//! Behavior every evaluation run must honor, checked through the facade:
//! - Three-valued logic
//! - Precision-aware temporal comparison
//! - Interval boundary semantics and collapse
//! - Query determinism and ordering
//! - Aggregate empty-input contract
//! - Definition cycles

use std::sync::Arc;
use std::thread;

use cqlpath::ast::{
    BinaryOp, IntervalOp, Query, QuerySource, SortDirection, SortItem, UnaryOp,
};
use cqlpath::{CqlEngine, CqlValue, EvalError, EvaluationContext, Expression, Library};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn eval(expr: &Expression) -> CqlValue {
    CqlEngine::new()
        .evaluate(expr, &mut EvaluationContext::new())
        .unwrap()
}

fn int(i: i32) -> Expression {
    Expression::integer(i)
}

fn ints(values: &[i32]) -> Expression {
    Expression::list(values.iter().copied().map(Expression::integer).collect())
}

fn int_values(values: &[i32]) -> CqlValue {
    CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
}

fn truth(value: Option<bool>) -> Expression {
    value.map_or_else(Expression::null, Expression::boolean)
}

// ============================================================================
// Logic
// ============================================================================

#[rstest]
#[case(BinaryOp::And, Some(false), None, Some(false))]
#[case(BinaryOp::And, Some(true), None, None)]
#[case(BinaryOp::Or, Some(true), None, Some(true))]
#[case(BinaryOp::Or, Some(false), None, None)]
#[case(BinaryOp::Xor, Some(true), None, None)]
#[case(BinaryOp::Implies, Some(false), None, Some(true))]
#[case(BinaryOp::Implies, None, Some(true), Some(true))]
#[case(BinaryOp::Implies, Some(true), None, None)]
fn test_three_valued_logic(
    #[case] op: BinaryOp,
    #[case] left: Option<bool>,
    #[case] right: Option<bool>,
    #[case] result: Option<bool>,
) {
    let expr = Expression::binary(op, truth(left), truth(right));
    assert_eq!(eval(&expr), CqlValue::from_option_bool(result));
}

#[test]
fn test_not_null_is_null() {
    assert_eq!(eval(&Expression::unary(UnaryOp::Not, Expression::null())), CqlValue::Null);
}

// ============================================================================
// Temporal precision
// ============================================================================

#[test]
fn test_temporal_equality_respects_precision() {
    let year = Expression::date(2024, None, None);
    let month = Expression::date(2024, Some(1), None);
    assert_eq!(eval(&Expression::binary(BinaryOp::Equal, year, month)), CqlValue::Null);

    let day = || Expression::date(2024, Some(1), Some(1));
    assert_eq!(
        eval(&Expression::binary(BinaryOp::Equal, day(), day())),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_date_before_date() {
    let expr = Expression::timing(
        IntervalOp::Before,
        None,
        Expression::date(2024, Some(1), Some(1)),
        Expression::date(2024, Some(6), Some(15)),
    );
    assert_eq!(eval(&expr), CqlValue::Boolean(true));
}

// ============================================================================
// Intervals
// ============================================================================

fn interval(low: i32, low_closed: bool, high: i32, high_closed: bool) -> Expression {
    Expression::interval(int(low), low_closed, int(high), high_closed)
}

#[rstest]
#[case(5, interval(1, true, 10, true), true)]
#[case(10, interval(1, true, 10, false), false)]
#[case(1, interval(1, false, 10, false), false)]
fn test_interval_membership(#[case] point: i32, #[case] range: Expression, #[case] member: bool) {
    let expr = Expression::binary(BinaryOp::In, int(point), range);
    assert_eq!(eval(&expr), CqlValue::Boolean(member));
}

#[test]
fn test_interval_rebuilt_from_its_bounds_is_equal() {
    let original = interval(3, true, 7, true);
    let rebuilt = Expression::interval(
        Expression::unary(UnaryOp::Start, original.clone()),
        true,
        Expression::unary(UnaryOp::End, original.clone()),
        true,
    );
    assert_eq!(
        eval(&Expression::binary(BinaryOp::Equal, rebuilt, original)),
        CqlValue::Boolean(true)
    );
}

#[test]
fn test_point_from_unit_interval() {
    let expr = Expression::unary(UnaryOp::PointFrom, interval(5, true, 5, true));
    assert_eq!(eval(&expr), CqlValue::Integer(5));
}

#[test]
fn test_collapse_twice_equals_collapse_once() {
    let intervals = Expression::list(vec![
        interval(1, true, 4, true),
        interval(3, true, 6, true),
        interval(10, true, 12, true),
    ]);
    let once = Expression::unary(UnaryOp::Collapse, intervals);
    let twice = Expression::unary(UnaryOp::Collapse, once.clone());
    assert_eq!(eval(&twice), eval(&once));
}

// ============================================================================
// Queries and aggregates
// ============================================================================

#[test]
fn test_query_filter_and_sort() {
    let filtered = Query::new(QuerySource::new(ints(&[1, 2, 3, 4, 5]), "X")).with_where(
        Expression::binary(BinaryOp::Greater, Expression::identifier("X"), int(2)),
    );
    let sorted = filtered
        .clone()
        .with_sort(vec![SortItem::element(SortDirection::Descending)]);

    let first = eval(&Expression::query(filtered.clone()));
    assert_eq!(first, int_values(&[3, 4, 5]));
    assert_eq!(eval(&Expression::query(filtered)), first);
    assert_eq!(eval(&Expression::query(sorted)), int_values(&[5, 4, 3]));
}

#[rstest]
#[case("Sum")]
#[case("Avg")]
#[case("Min")]
#[case("Max")]
fn test_aggregate_of_empty_is_null(#[case] name: &str) {
    let expr = Expression::call(name, vec![Expression::list(Vec::new())]);
    assert_eq!(eval(&expr), CqlValue::Null);
}

#[test]
fn test_count_of_empty_is_zero() {
    let expr = Expression::call("Count", vec![Expression::list(Vec::new())]);
    assert_eq!(eval(&expr), CqlValue::Integer(0));
}

// ============================================================================
// Definitions
// ============================================================================

#[rstest]
#[case("A")]
#[case("B")]
fn test_mutual_definitions_are_circular(#[case] start: &str) {
    let library = Library::new("Cycle")
        .define("A", Expression::identifier("B"))
        .define("B", Expression::identifier("A"));
    let result =
        CqlEngine::new().evaluate_definition(&library, start, &mut EvaluationContext::new());
    assert!(
        matches!(result, Err(EvalError::CircularDefinition { .. })),
        "{result:?}"
    );
}

#[test]
fn test_engine_is_shared_across_threads() {
    let engine = Arc::new(CqlEngine::new());
    let library = Arc::new(
        Library::new("Shared").define(
            "Doubled",
            Expression::binary(BinaryOp::Multiply, Expression::identifier("N"), int(2)),
        ),
    );
    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let engine = Arc::clone(&engine);
            let library = Arc::clone(&library);
            thread::spawn(move || {
                let mut ctx = EvaluationContext::builder()
                    .parameter("N", CqlValue::Integer(n))
                    .build();
                engine.evaluate_definition(&library, "Doubled", &mut ctx)
            })
        })
        .collect();
    let results: Vec<CqlValue> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();
    assert_eq!(results, (1..=4).map(|n| CqlValue::Integer(n * 2)).collect::<Vec<_>>());
}
