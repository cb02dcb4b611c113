//! CQL Type Coercion Rules
//!
//! Implicit conversions follow a fixed ladder:
//! - Integer -> Long -> Decimal
//! - Integer/Long/Decimal -> Quantity (unit `1`), only against a Quantity
//! - Code -> Concept
//! - Date -> DateTime
//!
//! Lossy conversions are never implicit; they are available only through
//! `explicit_convert` (`convert ... to`, `ToXxx`). A missing implicit path is
//! always an `IncompatibleType` error.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use thiserror::Error;

use crate::{
    CqlConcept, CqlDate, CqlDateTime, CqlInterval, CqlList, CqlQuantity, CqlTime, CqlType,
    CqlValue,
};

/// Coercion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// No implicit path unifies the operands
    #[error("Incompatible types: {left} and {right}")]
    IncompatibleType { left: String, right: String },

    /// No conversion exists between the types
    #[error("Cannot convert from {from} to {to}")]
    CannotConvert { from: String, to: String },
}

impl CoercionError {
    pub fn incompatible(left: &CqlType, right: &CqlType) -> Self {
        Self::IncompatibleType {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn cannot_convert(from: &CqlType, to: &CqlType) -> Self {
        Self::CannotConvert {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Type coercion result
pub type CoercionResult<T> = Result<T, CoercionError>;

/// Runtime type of a value
pub fn type_of(value: &CqlValue) -> CqlType {
    value.get_type()
}

/// Cost of an implicit conversion, lower is better. `None` when no implicit
/// path exists. Exact matches cost 0, ladder steps cost 1-3, `Any` costs 10.
pub fn conversion_cost(from: &CqlType, to: &CqlType) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    match (from, to) {
        (_, CqlType::Any) => Some(10),
        // null fits any parameter
        (CqlType::Any, _) => Some(1),
        (CqlType::Integer, CqlType::Long) => Some(1),
        (CqlType::Integer | CqlType::Long, CqlType::Decimal) => Some(2),
        (CqlType::Integer | CqlType::Long | CqlType::Decimal, CqlType::Quantity) => Some(3),
        (CqlType::Code, CqlType::Concept) => Some(1),
        (CqlType::Date, CqlType::DateTime) => Some(2),
        (CqlType::List(a), CqlType::List(b)) | (CqlType::Interval(a), CqlType::Interval(b)) => {
            conversion_cost(a, b)
        }
        (_, CqlType::Choice(types)) => types.iter().filter_map(|t| conversion_cost(from, t)).min(),
        _ if from.is_subtype_of(to) => Some(1),
        _ => None,
    }
}

/// Convert a value to `target` along the implicit ladder
pub fn coerce(value: CqlValue, target: &CqlType) -> CoercionResult<CqlValue> {
    let from = value.get_type();
    if value.is_null() || from.is_subtype_of(target) {
        return Ok(value);
    }
    match (value, target) {
        (CqlValue::Integer(i), CqlType::Long) => Ok(CqlValue::Long(i64::from(i))),
        (CqlValue::Integer(i), CqlType::Decimal) => Ok(CqlValue::Decimal(Decimal::from(i))),
        (CqlValue::Long(l), CqlType::Decimal) => Ok(CqlValue::Decimal(Decimal::from(l))),
        (v @ (CqlValue::Integer(_) | CqlValue::Long(_) | CqlValue::Decimal(_)), CqlType::Quantity) => {
            let amount = v.as_decimal().unwrap_or_default();
            Ok(CqlValue::Quantity(CqlQuantity::unitless(amount)))
        }
        (CqlValue::Code(code), CqlType::Concept) => {
            Ok(CqlValue::Concept(CqlConcept::from_code(code)))
        }
        (CqlValue::Date(date), CqlType::DateTime) => Ok(CqlValue::DateTime(date.to_datetime())),
        (CqlValue::List(list), CqlType::List(element)) => {
            let elements = list
                .elements
                .into_iter()
                .map(|e| coerce(e, element))
                .collect::<CoercionResult<Vec<_>>>()?;
            Ok(CqlValue::List(CqlList {
                element_type: (**element).clone(),
                elements,
            }))
        }
        (CqlValue::Interval(interval), CqlType::Interval(point)) => {
            let low = interval.low.map(|b| coerce(*b, point)).transpose()?;
            let high = interval.high.map(|b| coerce(*b, point)).transpose()?;
            Ok(CqlValue::Interval(CqlInterval::new(
                (**point).clone(),
                low,
                interval.low_closed,
                high,
                interval.high_closed,
            )))
        }
        (_, target) => Err(CoercionError::incompatible(&from, target)),
    }
}

/// Bring two operands onto a common type. Nulls pass through unchanged.
pub fn promote(left: CqlValue, right: CqlValue) -> CoercionResult<(CqlValue, CqlValue)> {
    if left.is_null() || right.is_null() {
        return Ok((left, right));
    }
    let (lt, rt) = (left.get_type(), right.get_type());
    if lt == rt {
        return Ok((left, right));
    }
    match (&left, &right) {
        (CqlValue::List(_), CqlValue::List(_)) | (CqlValue::Tuple(_), CqlValue::Tuple(_)) => {
            return Ok((left, right));
        }
        (CqlValue::Interval(a), CqlValue::Interval(b)) => {
            if a.point_type.is_any() || b.point_type.is_any() {
                return Ok((left, right));
            }
        }
        _ => {}
    }
    let target = wider(&lt, &rt).ok_or_else(|| CoercionError::incompatible(&lt, &rt))?;
    let left = if lt == target { left } else { coerce(left, &target)? };
    let right = if rt == target { right } else { coerce(right, &target)? };
    Ok((left, right))
}

/// The type both sides convert to implicitly, if any
fn wider(a: &CqlType, b: &CqlType) -> Option<CqlType> {
    let up = conversion_cost(a, b).filter(|_| !b.is_any());
    let down = conversion_cost(b, a).filter(|_| !a.is_any());
    match (up, down) {
        (Some(_), _) => Some(b.clone()),
        (None, Some(_)) => Some(a.clone()),
        (None, None) => None,
    }
}

// ============================================================================
// Explicit conversion
// ============================================================================

/// `convert value to target`. Unparseable strings and out-of-range numbers
/// yield `Null`; pairs of types with no conversion are `CannotConvert`.
pub fn explicit_convert(value: CqlValue, target: &CqlType) -> CoercionResult<CqlValue> {
    if value.is_null() {
        return Ok(CqlValue::Null);
    }
    let from = value.get_type();
    if from == *target || target.is_any() {
        return Ok(value);
    }
    let converted = match (&value, target) {
        (_, CqlType::String) => Some(CqlValue::String(to_plain_string(&value))),

        (CqlValue::String(s), CqlType::Boolean) => parse_boolean(s).map(CqlValue::Boolean),
        (CqlValue::Integer(i), CqlType::Boolean) => match i {
            1 => Some(CqlValue::Boolean(true)),
            0 => Some(CqlValue::Boolean(false)),
            _ => None,
        },
        (CqlValue::Decimal(d), CqlType::Boolean) => {
            if *d == Decimal::ONE {
                Some(CqlValue::Boolean(true))
            } else if d.is_zero() {
                Some(CqlValue::Boolean(false))
            } else {
                None
            }
        }

        (CqlValue::String(s), CqlType::Integer) => s.trim().parse::<i32>().ok().map(CqlValue::Integer),
        (CqlValue::Long(l), CqlType::Integer) => i32::try_from(*l).ok().map(CqlValue::Integer),
        (CqlValue::Decimal(d), CqlType::Integer) => d.trunc().to_i32().map(CqlValue::Integer),
        (CqlValue::Boolean(b), CqlType::Integer) => Some(CqlValue::Integer(i32::from(*b))),

        (CqlValue::String(s), CqlType::Long) => s.trim().parse::<i64>().ok().map(CqlValue::Long),
        (CqlValue::Integer(i), CqlType::Long) => Some(CqlValue::Long(i64::from(*i))),
        (CqlValue::Decimal(d), CqlType::Long) => d.trunc().to_i64().map(CqlValue::Long),
        (CqlValue::Boolean(b), CqlType::Long) => Some(CqlValue::Long(i64::from(*b))),

        (CqlValue::String(s), CqlType::Decimal) => parse_decimal(s).map(CqlValue::Decimal),
        (CqlValue::Integer(_) | CqlValue::Long(_), CqlType::Decimal) => {
            value.as_decimal().map(CqlValue::Decimal)
        }
        (CqlValue::Boolean(b), CqlType::Decimal) => {
            Some(CqlValue::Decimal(if *b { Decimal::ONE } else { Decimal::ZERO }))
        }

        (CqlValue::String(s), CqlType::Quantity) => parse_quantity(s).map(CqlValue::Quantity),
        (CqlValue::Integer(_) | CqlValue::Long(_) | CqlValue::Decimal(_), CqlType::Quantity) => value
            .as_decimal()
            .map(|d| CqlValue::Quantity(CqlQuantity::unitless(d))),

        (CqlValue::String(s), CqlType::Date) => CqlDate::parse(s).map(CqlValue::Date),
        (CqlValue::DateTime(dt), CqlType::Date) => Some(CqlValue::Date(dt.date())),

        (CqlValue::String(s), CqlType::DateTime) => CqlDateTime::parse(s).map(CqlValue::DateTime),
        (CqlValue::Date(d), CqlType::DateTime) => Some(CqlValue::DateTime(d.to_datetime())),

        (CqlValue::String(s), CqlType::Time) => CqlTime::parse(s).map(CqlValue::Time),
        (CqlValue::DateTime(dt), CqlType::Time) => dt.time().map(CqlValue::Time),

        (CqlValue::Code(c), CqlType::Concept) => {
            Some(CqlValue::Concept(CqlConcept::from_code(c.clone())))
        }

        _ => {
            return coerce(value.clone(), target)
                .map_err(|_| CoercionError::cannot_convert(&from, target));
        }
    };
    Ok(converted.unwrap_or(CqlValue::Null))
}

/// Whether `explicit_convert` would produce a non-null value
pub fn converts_to(value: &CqlValue, target: &CqlType) -> Option<bool> {
    if value.is_null() {
        return None;
    }
    Some(matches!(explicit_convert(value.clone(), target), Ok(v) if !v.is_null()))
}

/// Rendering used by `ToString`: literal text without quotes or `@`
pub fn to_plain_string(value: &CqlValue) -> String {
    match value {
        CqlValue::String(s) => s.clone(),
        CqlValue::Long(l) => l.to_string(),
        CqlValue::Date(d) => d.to_string(),
        CqlValue::DateTime(dt) => dt.to_string(),
        CqlValue::Time(t) => t.to_string(),
        other => other.to_string(),
    }
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    Decimal::from_str(s).ok()
}

/// `5`, `5 'mg'`, `5 mg`, `3 days`
fn parse_quantity(s: &str) -> Option<CqlQuantity> {
    let s = s.trim();
    let (number, unit) = match s.split_once(char::is_whitespace) {
        Some((n, u)) => (n, u.trim()),
        None => (s, ""),
    };
    let value = parse_decimal(number)?;
    let unit = unit
        .strip_prefix('\'')
        .and_then(|u| u.strip_suffix('\''))
        .unwrap_or(unit);
    Some(CqlQuantity::new(value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CqlCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_promote_integer_decimal() {
        let (l, r) = promote(CqlValue::integer(1), CqlValue::decimal(Decimal::new(15, 1))).unwrap();
        assert_eq!(l, CqlValue::decimal(Decimal::ONE));
        assert_eq!(r, CqlValue::decimal(Decimal::new(15, 1)));
    }

    #[test]
    fn test_promote_integer_long() {
        let (l, r) = promote(CqlValue::long(7), CqlValue::integer(2)).unwrap();
        assert_eq!(l, CqlValue::long(7));
        assert_eq!(r, CqlValue::long(2));
    }

    #[test]
    fn test_promote_number_to_quantity() {
        let q = CqlValue::Quantity(CqlQuantity::new(Decimal::from(5), "mg"));
        let (l, r) = promote(CqlValue::integer(2), q.clone()).unwrap();
        assert_eq!(l, CqlValue::Quantity(CqlQuantity::unitless(Decimal::from(2))));
        assert_eq!(r, q);
    }

    #[test]
    fn test_promote_code_to_concept() {
        let code = CqlCode::new("123", "http://snomed.info/sct");
        let concept = CqlValue::Concept(CqlConcept::from_code(code.clone()));
        let (l, _) = promote(CqlValue::Code(code), concept.clone()).unwrap();
        assert_eq!(l, concept);
    }

    #[test]
    fn test_promote_incompatible_is_error() {
        let err = promote(CqlValue::integer(1), CqlValue::string("1")).unwrap_err();
        assert!(matches!(err, CoercionError::IncompatibleType { .. }));
    }

    #[test]
    fn test_decimal_never_implicitly_integer() {
        assert!(coerce(CqlValue::decimal(Decimal::ONE), &CqlType::Integer).is_err());
        assert_eq!(conversion_cost(&CqlType::Decimal, &CqlType::Integer), None);
    }

    #[test]
    fn test_conversion_costs_rank_promotions() {
        assert_eq!(conversion_cost(&CqlType::Integer, &CqlType::Integer), Some(0));
        assert!(
            conversion_cost(&CqlType::Integer, &CqlType::Long)
                < conversion_cost(&CqlType::Integer, &CqlType::Decimal)
        );
        assert!(
            conversion_cost(&CqlType::Integer, &CqlType::Decimal)
                < conversion_cost(&CqlType::Integer, &CqlType::Any)
        );
    }

    #[test]
    fn test_explicit_string_conversions() {
        assert_eq!(
            explicit_convert(CqlValue::string("42"), &CqlType::Integer).unwrap(),
            CqlValue::integer(42)
        );
        assert_eq!(
            explicit_convert(CqlValue::string("abc"), &CqlType::Integer).unwrap(),
            CqlValue::Null
        );
        assert_eq!(
            explicit_convert(CqlValue::string("yes"), &CqlType::Boolean).unwrap(),
            CqlValue::boolean(true)
        );
        assert_eq!(
            explicit_convert(CqlValue::string("5 'mg'"), &CqlType::Quantity).unwrap(),
            CqlValue::Quantity(CqlQuantity::new(Decimal::from(5), "mg"))
        );
        assert_eq!(
            explicit_convert(CqlValue::string("2024-01-15"), &CqlType::Date).unwrap(),
            CqlValue::Date(CqlDate::new(2024, 1, 15))
        );
    }

    #[test]
    fn test_explicit_truncation() {
        assert_eq!(
            explicit_convert(CqlValue::decimal(Decimal::new(79, 1)), &CqlType::Integer).unwrap(),
            CqlValue::integer(7)
        );
    }

    #[test]
    fn test_to_string_plain() {
        assert_eq!(
            explicit_convert(CqlValue::Date(CqlDate::new(2024, 1, 15)), &CqlType::String).unwrap(),
            CqlValue::string("2024-01-15")
        );
    }

    #[test]
    fn test_converts_to() {
        assert_eq!(converts_to(&CqlValue::string("1.5"), &CqlType::Decimal), Some(true));
        assert_eq!(converts_to(&CqlValue::string("x"), &CqlType::Decimal), Some(false));
        assert_eq!(converts_to(&CqlValue::Null, &CqlType::Decimal), None);
    }
}
