//! Logical Operators
//!
//! Implements: And, Or, Xor, Implies, Not and the null tests (IsNull,
//! IsTrue, IsFalse). All follow three-valued logic: `Null` stands for an
//! unknown truth value.

use cqlpath_ast::BinaryOp;
use cqlpath_types::{CqlType, CqlValue};

use crate::error::{EvalError, EvalResult};

/// Read a three-valued boolean operand
fn truth(value: &CqlValue) -> EvalResult<Option<bool>> {
    match value {
        CqlValue::Null => Ok(None),
        CqlValue::Boolean(b) => Ok(Some(*b)),
        other => Err(EvalError::incompatible(&other.get_type(), &CqlType::Boolean)),
    }
}

/// Three-valued `and`
///
/// | A     | B     | A and B |
/// |-------|-------|---------|
/// | true  | null  | null    |
/// | false | null  | false   |
/// | null  | null  | null    |
pub fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Three-valued `or`
///
/// | A     | B     | A or B |
/// |-------|-------|--------|
/// | true  | null  | true   |
/// | false | null  | null   |
/// | null  | null  | null   |
pub fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Three-valued `xor`: unknown whenever either side is
pub fn xor3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    Some(a? != b?)
}

/// Three-valued `implies`, i.e. `(not A) or B`
pub fn implies3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    or3(a.map(|v| !v), b)
}

/// Fold three-valued `and` over an iterator; empty is `true`
pub fn all3(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(true);
    for v in values {
        result = and3(result, v);
        if result == Some(false) {
            break;
        }
    }
    result
}

/// Apply a logical binary operator
pub fn logical(op: BinaryOp, left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    let (a, b) = (truth(left)?, truth(right)?);
    let result = match op {
        BinaryOp::And => and3(a, b),
        BinaryOp::Or => or3(a, b),
        BinaryOp::Xor => xor3(a, b),
        BinaryOp::Implies => implies3(a, b),
        other => {
            return Err(EvalError::invalid_argument(
                other.to_string(),
                "not a logical operator",
            ));
        }
    };
    Ok(CqlValue::from_option_bool(result))
}

pub fn not(value: &CqlValue) -> EvalResult<CqlValue> {
    Ok(CqlValue::from_option_bool(truth(value)?.map(|b| !b)))
}

pub fn is_null(value: &CqlValue) -> CqlValue {
    CqlValue::Boolean(value.is_null())
}

pub fn is_true(value: &CqlValue) -> CqlValue {
    CqlValue::Boolean(value.is_true())
}

pub fn is_false(value: &CqlValue) -> CqlValue {
    CqlValue::Boolean(value.is_false())
}
