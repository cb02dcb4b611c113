//! Comparison Operators
//!
//! Implements: Equal, NotEqual, Equivalent, Less, Greater, LessOrEqual,
//! GreaterOrEqual. Equality and ordering are three-valued: `None` means the
//! answer is unknown (a null operand, or temporal values whose precisions
//! leave the answer open).

use std::cmp::Ordering;

use cqlpath_ast::BinaryOp;
use cqlpath_types::{
    CqlInterval, CqlQuantity, CqlValue, DateTimePrecision, promote,
};

use crate::error::{EvalError, EvalResult};
use crate::operators::interval;
use crate::operators::logical::{all3, and3};

/// CQL `=`. Operands without a common type are an `IncompatibleType` error.
pub fn equal(left: &CqlValue, right: &CqlValue) -> EvalResult<Option<bool>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    if let Some(ordering) = range_compare(left, right)? {
        return Ok(ordering.map(|o| o == Ordering::Equal));
    }

    let (l, r) = promote(left.clone(), right.clone())?;
    let result = match (&l, &r) {
        (CqlValue::Boolean(a), CqlValue::Boolean(b)) => Some(a == b),
        (CqlValue::Integer(a), CqlValue::Integer(b)) => Some(a == b),
        (CqlValue::Long(a), CqlValue::Long(b)) => Some(a == b),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => Some(a == b),
        (CqlValue::String(a), CqlValue::String(b)) => Some(a == b),
        (CqlValue::Date(a), CqlValue::Date(b)) => a.compare(b).map(Ordering::is_eq),
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => a.compare(b).map(Ordering::is_eq),
        (CqlValue::Time(a), CqlValue::Time(b)) => a.compare(b).map(Ordering::is_eq),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            compare_quantities(a, b).map(Ordering::is_eq)
        }
        (CqlValue::Ratio(a), CqlValue::Ratio(b)) => and3(
            compare_quantities(&a.numerator, &b.numerator).map(Ordering::is_eq),
            compare_quantities(&a.denominator, &b.denominator).map(Ordering::is_eq),
        ),
        (CqlValue::Code(a), CqlValue::Code(b)) => {
            Some(a.code == b.code && a.system == b.system && a.version == b.version)
        }
        (CqlValue::Concept(a), CqlValue::Concept(b)) => Some(
            a.codes.len() == b.codes.len()
                && a.codes.iter().zip(b.codes.iter()).all(|(x, y)| {
                    x.code == y.code && x.system == y.system && x.version == y.version
                }),
        ),
        (CqlValue::List(a), CqlValue::List(b)) => {
            if a.len() != b.len() {
                Some(false)
            } else {
                let pairs = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| equal(x, y))
                    .collect::<EvalResult<Vec<_>>>()?;
                all3(pairs)
            }
        }
        (CqlValue::Tuple(a), CqlValue::Tuple(b)) => {
            if a.len() != b.len() || a.iter().any(|(k, _)| b.get(k).is_none()) {
                Some(false)
            } else {
                let pairs = a
                    .iter()
                    .map(|(k, v)| match b.get(k) {
                        Some(w) => equal(v, w),
                        None => Ok(Some(false)),
                    })
                    .collect::<EvalResult<Vec<_>>>()?;
                all3(pairs)
            }
        }
        (CqlValue::Interval(a), CqlValue::Interval(b)) => interval::interval_equal(a, b)?,
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    };
    Ok(result)
}

/// CQL `~`. Never null: `null ~ null` is true, mismatched types are false.
/// Strings compare ignoring case and whitespace runs; decimals compare at the
/// coarser of the two scales; codes compare by code and system.
pub fn equivalent(left: &CqlValue, right: &CqlValue) -> EvalResult<bool> {
    match (left, right) {
        (CqlValue::Null, CqlValue::Null) => return Ok(true),
        (CqlValue::Null, _) | (_, CqlValue::Null) => return Ok(false),
        (CqlValue::Code(c), CqlValue::Concept(k)) | (CqlValue::Concept(k), CqlValue::Code(c)) => {
            return Ok(k.contains_equivalent(c));
        }
        _ => {}
    }
    let Ok((l, r)) = promote(left.clone(), right.clone()) else {
        return Ok(false);
    };
    let result = match (&l, &r) {
        (CqlValue::String(a), CqlValue::String(b)) => normalize(a) == normalize(b),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => {
            let scale = a.scale().min(b.scale());
            a.round_dp(scale) == b.round_dp(scale)
        }
        (CqlValue::Date(a), CqlValue::Date(b)) => {
            a.precision() == b.precision() && a.compare(b) == Some(Ordering::Equal)
        }
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => {
            a.precision() == b.precision() && a.compare(b) == Some(Ordering::Equal)
        }
        (CqlValue::Time(a), CqlValue::Time(b)) => {
            a.precision() == b.precision() && a.compare(b) == Some(Ordering::Equal)
        }
        (CqlValue::Code(a), CqlValue::Code(b)) => a.is_equivalent(b),
        (CqlValue::Concept(a), CqlValue::Concept(b)) => a.is_equivalent(b),
        (CqlValue::Ratio(a), CqlValue::Ratio(b)) => {
            compare_quantities(&a.numerator, &b.numerator) == Some(Ordering::Equal)
                && compare_quantities(&a.denominator, &b.denominator) == Some(Ordering::Equal)
        }
        (CqlValue::List(a), CqlValue::List(b)) => {
            if a.len() != b.len() {
                return Ok(false);
            }
            for (x, y) in a.iter().zip(b.iter()) {
                if !equivalent(x, y)? {
                    return Ok(false);
                }
            }
            true
        }
        (CqlValue::Tuple(a), CqlValue::Tuple(b)) => {
            if a.len() != b.len() {
                return Ok(false);
            }
            for (k, v) in a.iter() {
                match b.get(k) {
                    Some(w) if equivalent(v, w)? => {}
                    _ => return Ok(false),
                }
            }
            true
        }
        (CqlValue::Interval(a), CqlValue::Interval(b)) => interval::interval_equivalent(a, b)?,
        _ => matches!(equal(&l, &r), Ok(Some(true))),
    };
    Ok(result)
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Ordering of two values. `None` when unknown; `IncompatibleType` for
/// values without a common ordered type.
pub fn compare(left: &CqlValue, right: &CqlValue) -> EvalResult<Option<Ordering>> {
    compare_at(left, right, None)
}

/// Ordering at a temporal precision (`before day of`). Non-temporal values
/// ignore the precision.
pub fn compare_at(
    left: &CqlValue,
    right: &CqlValue,
    precision: Option<DateTimePrecision>,
) -> EvalResult<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    if let Some(ordering) = range_compare(left, right)? {
        return Ok(ordering);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    let result = match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => Some(a.cmp(b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => Some(a.cmp(b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => Some(a.cmp(b)),
        (CqlValue::String(a), CqlValue::String(b)) => Some(a.cmp(b)),
        (CqlValue::Date(a), CqlValue::Date(b)) => match precision {
            Some(p) => a.compare_at(b, p),
            None => a.compare(b),
        },
        (CqlValue::DateTime(a), CqlValue::DateTime(b)) => match precision {
            Some(p) => a.compare_at(b, p),
            None => a.compare(b),
        },
        (CqlValue::Time(a), CqlValue::Time(b)) => match precision {
            Some(p) => a.compare_at(b, p),
            None => a.compare(b),
        },
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => compare_quantities(a, b),
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    };
    Ok(result)
}

/// Compare quantities after converting `b` into `a`'s unit. `None` when the
/// units measure different dimensions.
pub fn compare_quantities(a: &CqlQuantity, b: &CqlQuantity) -> Option<Ordering> {
    b.convert_to(&a.unit).map(|b| a.value.cmp(&b.value))
}

/// A duration/difference range (`Interval[5, 6]`) against a point. Outer
/// `None` when the operands are not of that shape.
fn range_compare(left: &CqlValue, right: &CqlValue) -> EvalResult<Option<Option<Ordering>>> {
    match (left, right) {
        (CqlValue::Interval(range), point) if is_point(point) => {
            Ok(Some(range_against_point(range, point)?))
        }
        (point, CqlValue::Interval(range)) if is_point(point) => {
            Ok(Some(range_against_point(range, point)?.map(Ordering::reverse)))
        }
        _ => Ok(None),
    }
}

fn is_point(value: &CqlValue) -> bool {
    matches!(
        value,
        CqlValue::Integer(_) | CqlValue::Long(_) | CqlValue::Decimal(_)
    )
}

fn range_against_point(range: &CqlInterval, point: &CqlValue) -> EvalResult<Option<Ordering>> {
    let (Some(low), Some(high)) = (range.low(), range.high()) else {
        return Ok(None);
    };
    if compare(high, point)? == Some(Ordering::Less) {
        return Ok(Some(Ordering::Less));
    }
    if compare(low, point)? == Some(Ordering::Greater) {
        return Ok(Some(Ordering::Greater));
    }
    let exact = compare(low, point)? == Some(Ordering::Equal)
        && compare(high, point)? == Some(Ordering::Equal);
    Ok(exact.then_some(Ordering::Equal))
}

/// Equality used for membership and de-duplication: nulls match each other
/// and values of unrelated types simply differ
pub fn same_value(a: &CqlValue, b: &CqlValue) -> bool {
    match (a, b) {
        (CqlValue::Null, CqlValue::Null) => true,
        _ => matches!(equal(a, b), Ok(Some(true))),
    }
}

/// Apply `=`, `!=`, `<`, `<=`, `>`, `>=`
pub fn comparison(op: BinaryOp, left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    let result = match op {
        BinaryOp::Equal => equal(left, right)?,
        BinaryOp::NotEqual => equal(left, right)?.map(|b| !b),
        BinaryOp::Less => compare(left, right)?.map(Ordering::is_lt),
        BinaryOp::LessOrEqual => compare(left, right)?.map(Ordering::is_le),
        BinaryOp::Greater => compare(left, right)?.map(Ordering::is_gt),
        BinaryOp::GreaterOrEqual => compare(left, right)?.map(Ordering::is_ge),
        other => {
            return Err(EvalError::invalid_argument(
                other.to_string(),
                "not a comparison operator",
            ));
        }
    };
    Ok(CqlValue::from_option_bool(result))
}
