//! Built-in Function Tests
//!
//! Calls resolved through the function registry: string, conversion and
//! list functions, FHIRPath-style invocation and resolution failures.

use cqlpath_ast::{BinaryOp, Expression};
use cqlpath_eval::EvalError;
use cqlpath_types::CqlValue;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{binary, call, dec, eval, int, int_values, ints, try_eval};

fn text(s: &str) -> Expression {
    Expression::string(s)
}

#[rstest]
#[case(call("Upper", vec![text("abc")]), CqlValue::string("ABC"))]
#[case(call("Length", vec![text("hello")]), CqlValue::Integer(5))]
#[case(call("Substring", vec![text("hello"), int(1), int(3)]), CqlValue::string("ell"))]
#[case(call("PositionOf", vec![text("l"), text("hello")]), CqlValue::Integer(2))]
#[case(call("StartsWith", vec![text("hello"), text("he")]), CqlValue::Boolean(true))]
#[case(call("Matches", vec![text("abc123"), text("[a-z]+[0-9]+")]), CqlValue::Boolean(true))]
fn test_string_functions(#[case] expr: Expression, #[case] expected: CqlValue) {
    assert_eq!(eval(&expr), expected);
}

#[test]
fn test_split_and_combine() {
    let parts = call("Split", vec![text("a,b,c"), text(",")]);
    assert_eq!(
        eval(&parts),
        CqlValue::list(vec![
            CqlValue::string("a"),
            CqlValue::string("b"),
            CqlValue::string("c")
        ])
    );
    assert_eq!(eval(&call("Combine", vec![parts, text("-")])), CqlValue::string("a-b-c"));
}

#[test]
fn test_null_argument_propagates() {
    assert_eq!(eval(&call("Upper", vec![Expression::null()])), CqlValue::Null);
}

#[test]
fn test_invalid_regex_is_an_error() {
    let result = try_eval(&call("Matches", vec![text("abc"), text("(")]));
    assert!(matches!(result, Err(EvalError::InvalidRegex { .. })));
}

#[rstest]
#[case(call("ToInteger", vec![text("12")]), CqlValue::Integer(12))]
#[case(call("ToInteger", vec![text("twelve")]), CqlValue::Null)]
#[case(call("ToDecimal", vec![int(2)]), CqlValue::Decimal(dec("2")))]
#[case(call("ToString", vec![int(7)]), CqlValue::string("7"))]
#[case(call("ConvertsToInteger", vec![text("x")]), CqlValue::Boolean(false))]
fn test_conversion_functions(#[case] expr: Expression, #[case] expected: CqlValue) {
    assert_eq!(eval(&expr), expected);
}

#[rstest]
#[case(call("First", vec![ints(&[4, 5, 6])]), CqlValue::Integer(4))]
#[case(call("Last", vec![ints(&[4, 5, 6])]), CqlValue::Integer(6))]
#[case(call("Tail", vec![ints(&[4, 5, 6])]), int_values(&[5, 6]))]
#[case(call("Distinct", vec![ints(&[1, 1, 2])]), int_values(&[1, 2]))]
#[case(call("IndexOf", vec![ints(&[4, 5, 6]), int(6)]), CqlValue::Integer(2))]
fn test_list_functions(#[case] expr: Expression, #[case] expected: CqlValue) {
    assert_eq!(eval(&expr), expected);
}

#[test]
fn test_integer_argument_promotes_to_decimal() {
    let expr = call("Round", vec![int(3)]);
    assert_eq!(eval(&expr), CqlValue::Decimal(dec("3")));
}

#[test]
fn test_method_invocation_passes_focus_first() {
    let expr = Expression::invoke(text("abc"), "upper", Vec::new());
    assert_eq!(eval(&expr), CqlValue::string("ABC"));
    let count = Expression::invoke(ints(&[1, 2, 3]), "count", Vec::new());
    assert_eq!(eval(&count), CqlValue::Integer(3));
}

#[test]
fn test_unknown_function_is_unresolved() {
    let result = try_eval(&call("NoSuchFunction", vec![int(1)]));
    assert!(matches!(result, Err(EvalError::UnresolvedFunction { .. })));
    let mismatch = try_eval(&call("Upper", vec![int(1)]));
    assert!(matches!(mismatch, Err(EvalError::UnresolvedFunction { .. })));
}

#[test]
fn test_division_by_zero_is_null() {
    assert_eq!(eval(&binary(BinaryOp::Divide, int(1), int(0))), CqlValue::Null);
    assert_eq!(eval(&binary(BinaryOp::Divide, int(7), int(2))), CqlValue::Decimal(dec("3.5")));
}
