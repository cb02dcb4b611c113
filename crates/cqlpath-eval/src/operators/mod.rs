//! CQL Operator Implementations
//!
//! Value-level implementations organized by category:
//! - Arithmetic operators (Add, Subtract, math functions, etc.)
//! - Comparison operators (Equal, Equivalent, Less, etc.)
//! - Logical operators (And, Or, Not, etc.)
//! - String operators (Concatenate, Split, Matches, etc.)
//! - DateTime operators (constructors, components, durations)
//! - Interval operators (relations, Union, Collapse, Expand, etc.)
//! - List operators (First, Distinct, membership, etc.)
//! - Aggregate functions (Count, Sum, Avg, etc.)
//! - Type operators (Is, As, Convert)
//! - Clinical operators (CalculateAge, code membership)
//!
//! `apply_binary` and `apply_unary` are the single dispatch shared by CQL
//! operators and FHIRPath infix operators.

pub mod aggregate;
pub mod arithmetic;
pub mod clinical;
pub mod comparison;
pub mod datetime;
pub mod interval;
pub mod list;
pub mod logical;
pub mod string;
pub mod type_ops;

use cqlpath_ast::{BinaryOp, UnaryOp};
use cqlpath_types::CqlValue;

use crate::error::{EvalError, EvalResult};

/// Apply a binary operator to evaluated operands.
///
/// Null handling:
/// - logical operators follow the three-valued tables
/// - `~`, `!~` and `&` never yield `Null`
/// - `in`/`contains` look for a null element in lists; a Code is in a
///   Concept when it is equivalent to one of its codes
/// - list `union` treats a null operand as empty
/// - everything else with a null operand is `Null`
pub fn apply_binary(op: BinaryOp, left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::Implies => {
            logical::logical(op, left, right)
        }
        BinaryOp::Equivalent => Ok(CqlValue::Boolean(comparison::equivalent(left, right)?)),
        BinaryOp::NotEquivalent => Ok(CqlValue::Boolean(!comparison::equivalent(left, right)?)),
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Less
        | BinaryOp::LessOrEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterOrEqual => comparison::comparison(op, left, right),
        BinaryOp::Concatenate => string::concatenate(&[left.clone(), right.clone()]),
        BinaryOp::In => membership(right, left),
        BinaryOp::Contains => membership(left, right),
        BinaryOp::Union => set_union(left, right),
        BinaryOp::Intersect | BinaryOp::Except => set_difference(op, left, right),
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::TruncatedDivide
        | BinaryOp::Modulo
        | BinaryOp::Power => arithmetic::arithmetic(op, left, right),
    }
}

/// `container contains element`
fn membership(container: &CqlValue, element: &CqlValue) -> EvalResult<CqlValue> {
    match container {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Interval(interval) => Ok(CqlValue::from_option_bool(
            interval::contains_point(interval, element, None)?,
        )),
        CqlValue::Concept(_) => match element {
            CqlValue::Code(code) => Ok(CqlValue::Boolean(clinical::code_in(code, container))),
            CqlValue::Null => Ok(CqlValue::Null),
            other => Err(EvalError::incompatible(&other.get_type(), &container.get_type())),
        },
        CqlValue::List(_) => match element {
            // list `in` list is inclusion
            CqlValue::List(_) => Ok(list::includes(container, element)),
            _ => Ok(CqlValue::Boolean(list::list_contains(container, element))),
        },
        other => Err(EvalError::invalid_argument(
            "contains",
            format!("expected a List or Interval, found {}", other.get_type()),
        )),
    }
}

fn set_union(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match (left, right) {
        (CqlValue::Interval(a), CqlValue::Interval(b)) => interval::union(a, b),
        (CqlValue::Null, CqlValue::Null) => Ok(CqlValue::Null),
        (CqlValue::Interval(_), CqlValue::Null) | (CqlValue::Null, CqlValue::Interval(_)) => {
            Ok(CqlValue::Null)
        }
        // FHIRPath `|` treats singletons as one-element collections
        _ => Ok(list::union(&as_list(left), &as_list(right))),
    }
}

fn set_difference(op: BinaryOp, left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    match (op, left, right) {
        (BinaryOp::Intersect, CqlValue::Interval(a), CqlValue::Interval(b)) => {
            interval::intersect(a, b)
        }
        (BinaryOp::Except, CqlValue::Interval(a), CqlValue::Interval(b)) => interval::except(a, b),
        (BinaryOp::Intersect, CqlValue::List(_), CqlValue::List(_)) => {
            Ok(list::intersect(left, right))
        }
        (BinaryOp::Except, CqlValue::List(_), CqlValue::List(_)) => Ok(list::except(left, right)),
        _ => Err(EvalError::incompatible(&left.get_type(), &right.get_type())),
    }
}

fn as_list(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::List(_) | CqlValue::Null => value.clone(),
        single => CqlValue::list(vec![single.clone()]),
    }
}

/// Apply a unary operator to an evaluated operand
pub fn apply_unary(op: UnaryOp, operand: &CqlValue) -> EvalResult<CqlValue> {
    match op {
        UnaryOp::IsNull => return Ok(logical::is_null(operand)),
        UnaryOp::IsNotNull => return Ok(CqlValue::Boolean(!operand.is_null())),
        UnaryOp::IsTrue => return Ok(logical::is_true(operand)),
        UnaryOp::IsFalse => return Ok(logical::is_false(operand)),
        UnaryOp::Exists => return Ok(list::exists(operand)),
        _ => {}
    }
    if operand.is_null() {
        return Ok(CqlValue::Null);
    }
    match op {
        UnaryOp::Not => logical::not(operand),
        UnaryOp::Negate => arithmetic::negate(operand),
        UnaryOp::Distinct => Ok(list::distinct(operand)),
        UnaryOp::Flatten => Ok(list::flatten(operand)),
        UnaryOp::SingletonFrom => list::singleton_from(operand),
        UnaryOp::Successor => Ok(arithmetic::successor(operand)),
        UnaryOp::Predecessor => Ok(arithmetic::predecessor(operand)),
        UnaryOp::Collapse => match operand {
            CqlValue::List(list) => interval::collapse(&list.elements),
            other => Err(expected_interval(op, other)),
        },
        UnaryOp::Start
        | UnaryOp::End
        | UnaryOp::Width
        | UnaryOp::Size
        | UnaryOp::PointFrom => {
            let CqlValue::Interval(iv) = operand else {
                return Err(expected_interval(op, operand));
            };
            match op {
                UnaryOp::Start => Ok(interval::start(iv)),
                UnaryOp::End => Ok(interval::end(iv)),
                UnaryOp::Width => interval::width(iv),
                UnaryOp::Size => interval::size(iv),
                _ => interval::point_from(iv),
            }
        }
        UnaryOp::IsNull
        | UnaryOp::IsNotNull
        | UnaryOp::IsTrue
        | UnaryOp::IsFalse
        | UnaryOp::Exists => unreachable!("null-tolerant operators return above"),
    }
}

fn expected_interval(op: UnaryOp, found: &CqlValue) -> EvalError {
    EvalError::invalid_argument(
        op.to_string(),
        format!("expected an interval operand, found {}", found.get_type()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlpath_types::{CqlInterval, CqlType};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn closed(low: i32, high: i32) -> CqlValue {
        CqlValue::Interval(CqlInterval::closed(
            CqlType::Integer,
            CqlValue::Integer(low),
            CqlValue::Integer(high),
        ))
    }

    #[rstest]
    #[case(BinaryOp::Add)]
    #[case(BinaryOp::Less)]
    #[case(BinaryOp::Equal)]
    #[case(BinaryOp::Intersect)]
    fn test_null_operand_propagates(#[case] op: BinaryOp) {
        assert_eq!(apply_binary(op, &CqlValue::Null, &CqlValue::Integer(1)).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_null_tolerant_operators() {
        assert_eq!(
            apply_binary(BinaryOp::Equivalent, &CqlValue::Null, &CqlValue::Null).unwrap(),
            CqlValue::Boolean(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::And, &CqlValue::Boolean(false), &CqlValue::Null).unwrap(),
            CqlValue::Boolean(false)
        );
        assert_eq!(
            apply_binary(BinaryOp::Concatenate, &CqlValue::string("a"), &CqlValue::Null).unwrap(),
            CqlValue::string("a")
        );
        assert_eq!(apply_unary(UnaryOp::IsNull, &CqlValue::Null).unwrap(), CqlValue::Boolean(true));
    }

    #[test]
    fn test_membership_dispatch() {
        assert_eq!(
            apply_binary(BinaryOp::In, &CqlValue::Integer(5), &closed(1, 10)).unwrap(),
            CqlValue::Boolean(true)
        );
        let list = CqlValue::list(vec![CqlValue::Integer(1), CqlValue::Integer(2)]);
        assert_eq!(
            apply_binary(BinaryOp::Contains, &list, &CqlValue::Integer(2)).unwrap(),
            CqlValue::Boolean(true)
        );
    }

    #[test]
    fn test_mismatched_types_raise() {
        let result = apply_binary(BinaryOp::Add, &CqlValue::Integer(1), &CqlValue::string("a"));
        assert!(matches!(result, Err(EvalError::IncompatibleType { .. })));
    }

    #[test]
    fn test_interval_accessors_via_unary() {
        assert_eq!(apply_unary(UnaryOp::PointFrom, &closed(5, 5)).unwrap(), CqlValue::Integer(5));
        assert_eq!(apply_unary(UnaryOp::Width, &closed(2, 9)).unwrap(), CqlValue::Integer(7));
    }
}
