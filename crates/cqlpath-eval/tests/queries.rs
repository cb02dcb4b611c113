//! Query Evaluation Tests
//!
//! End-to-end tests for CQL queries:
//! - Single-source and multi-source (cartesian product) queries
//! - Let clauses
//! - With/Without relationship clauses
//! - Where filtering
//! - Return projection and distinct
//! - Sort (element, by expression, multi-key)
//! - Aggregate clause
//! - Retrieve through a data provider

use std::sync::Arc;

use cqlpath_ast::{
    AggregateClause, BinaryOp, Expression, Query, QuerySource, RelationshipClause, Retrieve,
    SortDirection, SortItem,
};
use cqlpath_eval::{CqlEngine, EvaluationContext, JsonDataProvider};
use cqlpath_types::{CqlTuple, CqlValue};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

fn run(query: Query) -> CqlValue {
    run_in(query, &mut EvaluationContext::new())
}

fn run_in(query: Query, ctx: &mut EvaluationContext) -> CqlValue {
    CqlEngine::new().evaluate(&Expression::query(query), ctx).unwrap()
}

fn ints(values: &[i32]) -> Expression {
    Expression::list(values.iter().copied().map(Expression::integer).collect())
}

fn int_values(values: &[i32]) -> CqlValue {
    CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
}

fn alias(name: &str) -> Expression {
    Expression::identifier(name)
}

fn source(values: &[i32], name: &str) -> QuerySource {
    QuerySource::new(ints(values), name)
}

fn person(name: &str, age: Option<i32>) -> Expression {
    Expression::tuple([
        ("name", Expression::string(name)),
        ("age", age.map_or_else(Expression::null, Expression::integer)),
    ])
}

// ============================================================================
// Basic Queries
// ============================================================================

#[test]
fn test_where_then_sort_descending() {
    let query = Query::new(source(&[1, 2, 3, 4, 5], "X"))
        .with_where(Expression::binary(BinaryOp::Greater, alias("X"), Expression::integer(2)))
        .with_sort(vec![SortItem::element(SortDirection::Descending)]);
    assert_eq!(run(query), int_values(&[5, 4, 3]));
}

#[test]
fn test_query_is_deterministic() {
    let query = Query::new(source(&[1, 2, 3, 4, 5], "X"))
        .with_where(Expression::binary(BinaryOp::Greater, alias("X"), Expression::integer(2)));
    let first = run(query.clone());
    assert_eq!(first, int_values(&[3, 4, 5]));
    assert_eq!(run(query), first);
}

#[test]
fn test_null_where_drops_row() {
    let query = Query::new(source(&[1, 2], "X")).with_where(Expression::null());
    assert_eq!(run(query), int_values(&[]));
}

#[test]
fn test_null_source_is_empty() {
    let query = Query::new(QuerySource::new(Expression::null(), "X"));
    assert_eq!(run(query), CqlValue::Null);
}

// ============================================================================
// Multi-source and relationships
// ============================================================================

#[test]
fn test_multi_source_returns_tuples() {
    let query = Query::multi(vec![source(&[1, 2], "A"), source(&[10], "B")]);
    let tuple = |a: i32, b: i32| {
        CqlValue::Tuple(CqlTuple::from_elements([
            ("A", CqlValue::Integer(a)),
            ("B", CqlValue::Integer(b)),
        ]))
    };
    assert_eq!(run(query), CqlValue::list(vec![tuple(1, 10), tuple(2, 10)]));
}

#[test]
fn test_multi_source_return_projection() {
    let query = Query::multi(vec![source(&[1, 2], "A"), source(&[10, 20], "B")]).with_return(
        Expression::binary(BinaryOp::Add, alias("A"), alias("B")),
        true,
    );
    assert_eq!(run(query), int_values(&[11, 21, 12, 22]));
}

#[test]
fn test_with_and_without() {
    let such_that = Expression::binary(BinaryOp::Equal, alias("X"), alias("Y"));
    let with = Query::new(source(&[1, 2, 3], "X"))
        .with_relationship(RelationshipClause::with(source(&[2, 3, 4], "Y"), such_that.clone()));
    assert_eq!(run(with), int_values(&[2, 3]));
    let without = Query::new(source(&[1, 2, 3], "X"))
        .with_relationship(RelationshipClause::without(source(&[2, 3, 4], "Y"), such_that));
    assert_eq!(run(without), int_values(&[1]));
}

#[test]
fn test_lets_see_earlier_lets() {
    let query = Query::new(source(&[1, 2], "X"))
        .with_let("Y", Expression::binary(BinaryOp::Add, alias("X"), Expression::integer(10)))
        .with_let("Z", Expression::binary(BinaryOp::Multiply, alias("Y"), Expression::integer(2)))
        .with_where(Expression::binary(BinaryOp::Greater, alias("Z"), Expression::integer(22)))
        .with_return(alias("Z"), false);
    assert_eq!(run(query), int_values(&[24]));
}

// ============================================================================
// Sort
// ============================================================================

#[test]
fn test_sort_by_tuple_field_nulls_first() {
    let people = Expression::list(vec![
        person("b", Some(40)),
        person("a", None),
        person("c", Some(20)),
    ]);
    let query = Query::new(QuerySource::new(people, "P"))
        .with_sort(vec![SortItem::by(alias("age"), SortDirection::Ascending)]);
    assert_eq!(names(run(query)), vec!["a", "c", "b"]);
}

fn names(people: CqlValue) -> Vec<String> {
    people
        .into_elements()
        .iter()
        .filter_map(|p| p.as_tuple().and_then(|t| t.get("name")).and_then(CqlValue::as_string))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_multi_key_sort_is_stable() {
    let people = Expression::list(vec![
        person("b", Some(30)),
        person("a", Some(30)),
        person("c", Some(20)),
    ]);
    let query = Query::new(QuerySource::new(people, "P")).with_sort(vec![
        SortItem::by(alias("age"), SortDirection::Descending),
        SortItem::by(alias("name"), SortDirection::Ascending),
    ]);
    assert_eq!(names(run(query)), vec!["a", "b", "c"]);
}

// ============================================================================
// Aggregate
// ============================================================================

#[test]
fn test_aggregate_sum() {
    let query = Query::new(source(&[1, 2, 3, 4], "X")).with_aggregate(AggregateClause::new(
        "Total",
        Some(Expression::integer(0)),
        Expression::binary(BinaryOp::Add, alias("Total"), alias("X")),
    ));
    assert_eq!(run(query), CqlValue::Integer(10));
}

#[test]
fn test_aggregate_distinct() {
    let query = Query::new(source(&[1, 1, 2, 2], "X")).with_aggregate(
        AggregateClause::new(
            "Total",
            Some(Expression::integer(0)),
            Expression::binary(BinaryOp::Add, alias("Total"), alias("X")),
        )
        .distinct(),
    );
    assert_eq!(run(query), CqlValue::Integer(3));
}

#[test]
fn test_aggregate_without_start_is_seeded_with_null() {
    let query = Query::new(source(&[1, 2], "X")).with_aggregate(AggregateClause::new(
        "Acc",
        None,
        Expression::Coalesce(vec![alias("Acc"), alias("X")]),
    ));
    assert_eq!(run(query), CqlValue::Integer(1));
}

// ============================================================================
// Retrieve
// ============================================================================

fn observations() -> JsonDataProvider {
    JsonDataProvider::with_resources([
        json!({
            "resourceType": "Observation",
            "id": "bp",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8480-6" }] },
            "valueQuantity": { "value": 120, "unit": "mm[Hg]" }
        }),
        json!({
            "resourceType": "Observation",
            "id": "hr",
            "code": { "coding": [{ "system": "http://loinc.org", "code": "8867-4" }] },
            "valueQuantity": { "value": 80, "unit": "/min" }
        }),
        json!({ "resourceType": "Patient", "id": "p1" }),
    ])
}

#[test]
fn test_retrieve_filters_by_code() {
    let mut ctx = EvaluationContext::builder()
        .provider(Arc::new(observations()))
        .build();
    let retrieve = Retrieve::new("Observation").with_codes(
        None,
        Expression::Code {
            code: "8480-6".to_string(),
            system: Some("http://loinc.org".to_string()),
            display: None,
        },
    );
    let query = Query::new(QuerySource::new(Expression::Retrieve(retrieve), "O"))
        .with_return(Expression::property(alias("O"), "id"), false);
    assert_eq!(run_in(query, &mut ctx), CqlValue::list(vec![CqlValue::string("bp")]));
}

#[test]
fn test_retrieve_without_provider_is_empty() {
    let query = Query::new(QuerySource::new(Expression::retrieve("Condition"), "C"));
    assert_eq!(run(query), CqlValue::list(Vec::new()));
}

#[test]
fn test_retrieved_codes_are_codes() {
    let mut ctx = EvaluationContext::builder()
        .provider(Arc::new(observations()))
        .build();
    let query = Query::new(QuerySource::new(Expression::retrieve("Observation"), "O"))
        .with_where(Expression::binary(
            BinaryOp::In,
            Expression::Code {
                code: "8867-4".to_string(),
                system: Some("http://loinc.org".to_string()),
                display: None,
            },
            Expression::property(alias("O"), "code"),
        ))
        .with_return(Expression::property(alias("O"), "id"), false);
    assert_eq!(run_in(query, &mut ctx), CqlValue::list(vec![CqlValue::string("hr")]));
}
