//! Type Operators
//!
//! Implements: Is, As, Convert, the ToXxx/ConvertsToXxx families and
//! MinValue/MaxValue. Model types (`FHIR.Patient`) match tuples by their
//! `resourceType` field.

use cqlpath_types::{CqlType, CqlValue, converts_to, explicit_convert};

use crate::error::{EvalError, EvalResult};

/// Model type name carried by a record
fn record_type(value: &CqlValue) -> Option<&str> {
    match value {
        CqlValue::Tuple(tuple) => tuple.get("resourceType").and_then(CqlValue::as_string),
        _ => None,
    }
}

/// `value is T`. `null is T` is false.
pub fn is_type(value: &CqlValue, target: &CqlType) -> bool {
    match (value, target) {
        (CqlValue::Null, _) => false,
        (_, CqlType::Any) => true,
        (_, CqlType::Named { name, .. }) => record_type(value) == Some(name.as_str()),
        (_, CqlType::Choice(types)) => types.iter().any(|t| is_type(value, t)),
        (CqlValue::List(list), CqlType::List(element)) => list
            .iter()
            .all(|e| e.is_null() || is_type(e, element)),
        _ => value.get_type().is_subtype_of(target),
    }
}

/// `value as T`. A mismatch is `Null`, or an error for `cast ... as`.
pub fn as_type(value: CqlValue, target: &CqlType, strict: bool) -> EvalResult<CqlValue> {
    if value.is_null() || is_type(&value, target) {
        return Ok(value);
    }
    if strict {
        return Err(EvalError::incompatible(&value.get_type(), target));
    }
    Ok(CqlValue::Null)
}

/// `convert value to T` and `ToXxx`. Unparseable input is `Null`.
pub fn convert(value: CqlValue, target: &CqlType) -> EvalResult<CqlValue> {
    Ok(explicit_convert(value, target)?)
}

/// `ConvertsToXxx`: whether `convert` would yield a value
pub fn converts(value: &CqlValue, target: &CqlType) -> CqlValue {
    CqlValue::from_option_bool(converts_to(value, target))
}

pub fn min_value(target: &CqlType) -> EvalResult<CqlValue> {
    CqlValue::minimum(target).ok_or_else(|| {
        EvalError::invalid_argument("MinValue", format!("{target} has no minimum value"))
    })
}

pub fn max_value(target: &CqlType) -> EvalResult<CqlValue> {
    CqlValue::maximum(target).ok_or_else(|| {
        EvalError::invalid_argument("MaxValue", format!("{target} has no maximum value"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlpath_types::CqlTuple;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_is_checks_runtime_type() {
        assert!(is_type(&CqlValue::Integer(1), &CqlType::Integer));
        assert!(!is_type(&CqlValue::Integer(1), &CqlType::Decimal));
        assert!(!is_type(&CqlValue::Null, &CqlType::Integer));
        let patient = CqlValue::Tuple(CqlTuple::from_elements([
            ("resourceType", CqlValue::string("Patient")),
        ]));
        assert!(is_type(&patient, &CqlType::named("Patient")));
        assert!(!is_type(&patient, &CqlType::named("Observation")));
    }

    #[test]
    fn test_as_strict_and_lenient() {
        assert_eq!(
            as_type(CqlValue::string("x"), &CqlType::Integer, false).unwrap(),
            CqlValue::Null
        );
        assert!(as_type(CqlValue::string("x"), &CqlType::Integer, true).is_err());
        assert_eq!(
            as_type(CqlValue::Integer(3), &CqlType::Integer, true).unwrap(),
            CqlValue::Integer(3)
        );
    }

    #[test]
    fn test_convert_and_converts() {
        assert_eq!(
            convert(CqlValue::string("12.5"), &CqlType::Decimal).unwrap(),
            CqlValue::Decimal(Decimal::new(125, 1))
        );
        assert_eq!(convert(CqlValue::string("abc"), &CqlType::Integer).unwrap(), CqlValue::Null);
        assert_eq!(converts(&CqlValue::string("abc"), &CqlType::Integer), CqlValue::Boolean(false));
        assert_eq!(converts(&CqlValue::Null, &CqlType::Integer), CqlValue::Null);
    }

    #[test]
    fn test_min_max_value() {
        assert_eq!(min_value(&CqlType::Integer).unwrap(), CqlValue::Integer(i32::MIN));
        assert_eq!(max_value(&CqlType::Long).unwrap(), CqlValue::Long(i64::MAX));
        assert!(min_value(&CqlType::String).is_err());
    }
}
