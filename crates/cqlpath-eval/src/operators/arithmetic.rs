//! Arithmetic Operators
//!
//! Implements: Add, Subtract, Multiply, Divide, TruncatedDivide, Modulo,
//! Power, Negate, Successor, Predecessor and the math functions (Abs,
//! Ceiling, Floor, Truncate, Round, Ln, Exp, Log, Sqrt, Precision).
//!
//! Division by zero, overflow and results outside the Decimal range are
//! `Null`, never an error.

use cqlpath_ast::{BinaryOp, TemporalPrecision};
use cqlpath_types::{
    CqlQuantity, CqlValue, DateTimePrecision, UNITLESS, max_decimal, promote,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::{EvalError, EvalResult};

/// Smallest Decimal step, used by successor/predecessor
pub fn decimal_step() -> Decimal {
    Decimal::new(1, 8)
}

/// Decimal places kept by division and transcendental functions
const DECIMAL_SCALE: u32 = 8;

fn in_range(d: Decimal) -> Option<Decimal> {
    (d.abs() <= max_decimal()).then_some(d)
}

pub(crate) fn from_f64(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    Decimal::from_f64(f)
        .map(|d| d.round_dp(DECIMAL_SCALE))
        .and_then(in_range)
}

fn decimal_or_null(d: Option<Decimal>) -> CqlValue {
    d.and_then(in_range).map_or(CqlValue::Null, CqlValue::Decimal)
}

fn integer_or_null(i: Option<i32>) -> CqlValue {
    i.map_or(CqlValue::Null, CqlValue::Integer)
}

fn long_or_null(l: Option<i64>) -> CqlValue {
    l.map_or(CqlValue::Null, CqlValue::Long)
}

fn quantity_or_null(value: Option<Decimal>, unit: impl Into<String>) -> CqlValue {
    match value.and_then(in_range) {
        Some(v) => CqlValue::Quantity(CqlQuantity::new(v, unit)),
        None => CqlValue::Null,
    }
}

/// Apply an arithmetic binary operator
pub fn arithmetic(op: BinaryOp, left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Subtract => subtract(left, right),
        BinaryOp::Multiply => multiply(left, right),
        BinaryOp::Divide => divide(left, right),
        BinaryOp::TruncatedDivide => truncated_divide(left, right),
        BinaryOp::Modulo => modulo(left, right),
        BinaryOp::Power => power(left, right),
        other => Err(EvalError::invalid_argument(
            other.to_string(),
            "not an arithmetic operator",
        )),
    }
}

// ============================================================================
// Addition and subtraction
// ============================================================================

/// Whole number of calendar units carried by a duration quantity. The
/// fractional part is dropped.
fn temporal_amount(q: &CqlQuantity) -> Option<(i64, TemporalPrecision)> {
    let unit = q.temporal_unit()?;
    Some((q.value.trunc().to_i64()?, unit))
}

/// Shift a temporal value by a duration quantity
fn shift(value: &CqlValue, q: &CqlQuantity, negate: bool) -> EvalResult<CqlValue> {
    let Some((amount, unit)) = temporal_amount(q) else {
        return Ok(CqlValue::Null);
    };
    let amount = if negate {
        match amount.checked_neg() {
            Some(a) => a,
            None => return Ok(CqlValue::Null),
        }
    } else {
        amount
    };
    Ok(match value {
        CqlValue::Date(d) => d.add(amount, unit).map_or(CqlValue::Null, CqlValue::Date),
        CqlValue::DateTime(dt) => dt.add(amount, unit).map_or(CqlValue::Null, CqlValue::DateTime),
        CqlValue::Time(t) => t.add(amount, unit).map_or(CqlValue::Null, CqlValue::Time),
        _ => CqlValue::Null,
    })
}

fn is_temporal(value: &CqlValue) -> bool {
    matches!(value, CqlValue::Date(_) | CqlValue::DateTime(_) | CqlValue::Time(_))
}

pub fn add(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    match (left, right) {
        (t, CqlValue::Quantity(q)) if is_temporal(t) => return shift(t, q, false),
        (CqlValue::Quantity(q), t) if is_temporal(t) => return shift(t, q, false),
        (CqlValue::String(a), CqlValue::String(b)) => return Ok(CqlValue::string(format!("{a}{b}"))),
        _ => {}
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => integer_or_null(a.checked_add(*b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => long_or_null(a.checked_add(*b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => decimal_or_null(a.checked_add(*b)),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => match b.convert_to(&a.unit) {
            Some(b) => quantity_or_null(a.value.checked_add(b.value), a.unit.clone()),
            None => CqlValue::Null,
        },
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

pub fn subtract(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    if let (t, CqlValue::Quantity(q)) = (left, right) {
        if is_temporal(t) {
            return shift(t, q, true);
        }
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => integer_or_null(a.checked_sub(*b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => long_or_null(a.checked_sub(*b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => decimal_or_null(a.checked_sub(*b)),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => match b.convert_to(&a.unit) {
            Some(b) => quantity_or_null(a.value.checked_sub(b.value), a.unit.clone()),
            None => CqlValue::Null,
        },
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

// ============================================================================
// Multiplication and division
// ============================================================================

fn multiply_units(a: &str, b: &str) -> String {
    match (a == UNITLESS, b == UNITLESS) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}.{b}"),
    }
}

fn divide_units(a: &str, b: &str) -> String {
    if a == b {
        return UNITLESS.to_string();
    }
    match (a == UNITLESS, b == UNITLESS) {
        (_, true) => a.to_string(),
        (true, _) => format!("1/{b}"),
        _ => format!("{a}/{b}"),
    }
}

pub fn multiply(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => integer_or_null(a.checked_mul(*b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => long_or_null(a.checked_mul(*b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => decimal_or_null(a.checked_mul(*b)),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => quantity_or_null(
            a.value.checked_mul(b.value),
            multiply_units(&a.unit, &b.unit),
        ),
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

fn checked_decimal_div(a: Decimal, b: Decimal) -> Option<Decimal> {
    if b.is_zero() {
        return None;
    }
    a.checked_div(b).map(|d| d.round_dp(DECIMAL_SCALE))
}

/// `/` always produces a Decimal (or Quantity)
pub fn divide(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => {
            // like units cancel after conversion
            match b.convert_to(&a.unit) {
                Some(b) if !a.is_unitless() => {
                    quantity_or_null(checked_decimal_div(a.value, b.value), UNITLESS)
                }
                _ => quantity_or_null(
                    checked_decimal_div(a.value, b.value),
                    divide_units(&a.unit, &b.unit),
                ),
            }
        }
        _ => match (l.as_decimal(), r.as_decimal()) {
            (Some(a), Some(b)) => decimal_or_null(checked_decimal_div(a, b)),
            _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
        },
    })
}

/// `div`: quotient truncated toward zero
pub fn truncated_divide(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => integer_or_null(a.checked_div(*b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => long_or_null(a.checked_div(*b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => {
            decimal_or_null(checked_decimal_div(*a, *b).map(|d| d.trunc()))
        }
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => match b.convert_to(&a.unit) {
            Some(b) => quantity_or_null(
                checked_decimal_div(a.value, b.value).map(|d| d.trunc()),
                a.unit.clone(),
            ),
            None => CqlValue::Null,
        },
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

/// `mod`: remainder with the sign of the dividend
pub fn modulo(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => integer_or_null(a.checked_rem(*b)),
        (CqlValue::Long(a), CqlValue::Long(b)) => long_or_null(a.checked_rem(*b)),
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => decimal_or_null(a.checked_rem(*b)),
        (CqlValue::Quantity(a), CqlValue::Quantity(b)) => match b.convert_to(&a.unit) {
            Some(b) => quantity_or_null(a.value.checked_rem(b.value), a.unit.clone()),
            None => CqlValue::Null,
        },
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

fn decimal_power(base: Decimal, exponent: Decimal) -> Option<Decimal> {
    if base.is_zero() && exponent.is_sign_negative() {
        return None;
    }
    from_f64(base.to_f64()?.powf(exponent.to_f64()?))
}

/// `^`. Integer powers stay integral for non-negative exponents.
pub fn power(left: &CqlValue, right: &CqlValue) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let (l, r) = promote(left.clone(), right.clone())?;
    Ok(match (&l, &r) {
        (CqlValue::Integer(a), CqlValue::Integer(b)) => match u32::try_from(*b) {
            Ok(exp) => integer_or_null(a.checked_pow(exp)),
            Err(_) => decimal_or_null(decimal_power(Decimal::from(*a), Decimal::from(*b))),
        },
        (CqlValue::Long(a), CqlValue::Long(b)) => match u32::try_from(*b) {
            Ok(exp) => long_or_null(a.checked_pow(exp)),
            Err(_) => decimal_or_null(decimal_power(Decimal::from(*a), Decimal::from(*b))),
        },
        (CqlValue::Decimal(a), CqlValue::Decimal(b)) => decimal_or_null(decimal_power(*a, *b)),
        _ => return Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    })
}

// ============================================================================
// Unary
// ============================================================================

pub fn negate(value: &CqlValue) -> EvalResult<CqlValue> {
    Ok(match value {
        CqlValue::Null => CqlValue::Null,
        CqlValue::Integer(i) => integer_or_null(i.checked_neg()),
        CqlValue::Long(l) => long_or_null(l.checked_neg()),
        CqlValue::Decimal(d) => CqlValue::Decimal(-*d),
        CqlValue::Quantity(q) => CqlValue::Quantity(CqlQuantity::new(-q.value, q.unit.clone())),
        other => {
            return Err(EvalError::invalid_argument(
                "negate",
                format!("cannot negate {}", other.get_type()),
            ));
        }
    })
}

/// Next value of the point type; `None` past its maximum
pub fn successor_of(value: &CqlValue) -> Option<CqlValue> {
    match value {
        CqlValue::Integer(i) => i.checked_add(1).map(CqlValue::Integer),
        CqlValue::Long(l) => l.checked_add(1).map(CqlValue::Long),
        CqlValue::Decimal(d) => d
            .checked_add(decimal_step())
            .and_then(in_range)
            .map(CqlValue::Decimal),
        CqlValue::Quantity(q) => q
            .value
            .checked_add(decimal_step())
            .and_then(in_range)
            .map(|v| CqlValue::Quantity(CqlQuantity::new(v, q.unit.clone()))),
        CqlValue::Date(d) => d.successor().map(CqlValue::Date),
        CqlValue::DateTime(dt) => dt.successor().map(CqlValue::DateTime),
        CqlValue::Time(t) => t.successor().map(CqlValue::Time),
        _ => None,
    }
}

/// Previous value of the point type; `None` past its minimum
pub fn predecessor_of(value: &CqlValue) -> Option<CqlValue> {
    match value {
        CqlValue::Integer(i) => i.checked_sub(1).map(CqlValue::Integer),
        CqlValue::Long(l) => l.checked_sub(1).map(CqlValue::Long),
        CqlValue::Decimal(d) => d
            .checked_sub(decimal_step())
            .and_then(in_range)
            .map(CqlValue::Decimal),
        CqlValue::Quantity(q) => q
            .value
            .checked_sub(decimal_step())
            .and_then(in_range)
            .map(|v| CqlValue::Quantity(CqlQuantity::new(v, q.unit.clone()))),
        CqlValue::Date(d) => d.predecessor().map(CqlValue::Date),
        CqlValue::DateTime(dt) => dt.predecessor().map(CqlValue::DateTime),
        CqlValue::Time(t) => t.predecessor().map(CqlValue::Time),
        _ => None,
    }
}

pub fn successor(value: &CqlValue) -> CqlValue {
    successor_of(value).unwrap_or(CqlValue::Null)
}

pub fn predecessor(value: &CqlValue) -> CqlValue {
    predecessor_of(value).unwrap_or(CqlValue::Null)
}

// ============================================================================
// Math functions
// ============================================================================

pub fn abs(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Integer(i) => integer_or_null(i.checked_abs()),
        CqlValue::Long(l) => long_or_null(l.checked_abs()),
        CqlValue::Decimal(d) => CqlValue::Decimal(d.abs()),
        CqlValue::Quantity(q) => CqlValue::Quantity(CqlQuantity::new(q.value.abs(), q.unit.clone())),
        _ => CqlValue::Null,
    }
}

pub fn ceiling(value: &CqlValue) -> CqlValue {
    match value.as_decimal() {
        Some(d) => integer_or_null(d.ceil().to_i32()),
        None => CqlValue::Null,
    }
}

pub fn floor(value: &CqlValue) -> CqlValue {
    match value.as_decimal() {
        Some(d) => integer_or_null(d.floor().to_i32()),
        None => CqlValue::Null,
    }
}

pub fn truncate(value: &CqlValue) -> CqlValue {
    match value.as_decimal() {
        Some(d) => integer_or_null(d.trunc().to_i32()),
        None => CqlValue::Null,
    }
}

/// Round half toward positive infinity (`Round(-0.5) = 0`)
pub fn round(value: &CqlValue, precision: u32) -> CqlValue {
    let Some(d) = value.as_decimal() else {
        return CqlValue::Null;
    };
    let Some(factor) = 10i64
        .checked_pow(precision.min(DECIMAL_SCALE))
        .map(Decimal::from)
    else {
        return CqlValue::Null;
    };
    let rounded = d
        .checked_mul(factor)
        .and_then(|scaled| scaled.checked_add(Decimal::new(5, 1)))
        .map(|shifted| shifted.floor())
        .and_then(|floored| floored.checked_div(factor));
    decimal_or_null(rounded)
}

pub fn ln(value: &CqlValue) -> CqlValue {
    match value.as_decimal().and_then(|d| d.to_f64()) {
        Some(f) if f > 0.0 => decimal_or_null(from_f64(f.ln())),
        _ => CqlValue::Null,
    }
}

pub fn exp(value: &CqlValue) -> CqlValue {
    match value.as_decimal().and_then(|d| d.to_f64()) {
        Some(f) => decimal_or_null(from_f64(f.exp())),
        None => CqlValue::Null,
    }
}

pub fn log(value: &CqlValue, base: &CqlValue) -> CqlValue {
    let x = value.as_decimal().and_then(|d| d.to_f64());
    let b = base.as_decimal().and_then(|d| d.to_f64());
    match (x, b) {
        (Some(x), Some(b)) if x > 0.0 && b > 0.0 && b != 1.0 => {
            decimal_or_null(from_f64(x.ln() / b.ln()))
        }
        _ => CqlValue::Null,
    }
}

pub fn sqrt(value: &CqlValue) -> CqlValue {
    match value.as_decimal().and_then(|d| d.to_f64()) {
        Some(f) if f >= 0.0 => decimal_or_null(from_f64(f.sqrt())),
        _ => CqlValue::Null,
    }
}

/// Significant digits: decimal places for Decimal, digit count for temporals
pub fn precision(value: &CqlValue) -> CqlValue {
    let digits = |p: DateTimePrecision| match p {
        DateTimePrecision::Year => 4,
        DateTimePrecision::Month => 6,
        DateTimePrecision::Day => 8,
        DateTimePrecision::Hour => 10,
        DateTimePrecision::Minute => 12,
        DateTimePrecision::Second => 14,
        DateTimePrecision::Millisecond => 17,
    };
    match value {
        CqlValue::Decimal(d) => integer_or_null(i32::try_from(d.scale()).ok()),
        CqlValue::Date(d) => CqlValue::Integer(digits(d.precision())),
        CqlValue::DateTime(dt) => CqlValue::Integer(digits(dt.precision())),
        // time digits start at the hour
        CqlValue::Time(t) => CqlValue::Integer(digits(t.precision()) - 8),
        _ => CqlValue::Null,
    }
}
