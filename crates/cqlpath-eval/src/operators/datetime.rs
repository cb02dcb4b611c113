//! DateTime Operators
//!
//! Implements: the Date, DateTime and Time constructors, component
//! extraction (`year from`, `month from`, ...), DateFrom, TimeFrom,
//! TimezoneOffsetFrom and the duration/difference calculations. `Now`,
//! `Today` and `TimeOfDay` read the fixed clock on the evaluation context.

use cqlpath_ast::TemporalPrecision;
use cqlpath_types::{
    CqlDateTime, CqlInterval, CqlType, CqlValue, DateTimePrecision, TemporalSpan, promote,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{EvalError, EvalResult};

/// Leading non-null components as integers. A component after a null one
/// is rejected.
fn leading_parts(operation: &str, args: &[CqlValue]) -> EvalResult<Vec<i32>> {
    let mut parts = Vec::with_capacity(args.len());
    let mut ended = false;
    for arg in args {
        match arg {
            CqlValue::Null => ended = true,
            value if ended => {
                return Err(EvalError::invalid_argument(
                    operation,
                    format!("component {value} follows a missing component"),
                ));
            }
            CqlValue::Integer(i) => parts.push(*i),
            other => {
                return Err(EvalError::invalid_argument(
                    operation,
                    format!("expected Integer component, found {}", other.get_type()),
                ));
            }
        }
    }
    Ok(parts)
}

/// Component ranges before narrowing into the value types
fn check_ranges(operation: &str, parts: &[i32], first: usize) -> EvalResult<()> {
    const LIMITS: [(&str, i32, i32); 7] = [
        ("year", 1, 9999),
        ("month", 1, 12),
        ("day", 1, 31),
        ("hour", 0, 23),
        ("minute", 0, 59),
        ("second", 0, 59),
        ("millisecond", 0, 999),
    ];
    for (value, (name, min, max)) in parts.iter().zip(LIMITS.iter().skip(first)) {
        if !(*min..=*max).contains(value) {
            return Err(EvalError::invalid_argument(
                operation,
                format!("{name} {value} out of range {min}..{max}"),
            ));
        }
    }
    Ok(())
}

/// `Date(year, month?, day?)`
pub fn date(args: &[CqlValue]) -> EvalResult<CqlValue> {
    let parts = leading_parts("Date", args)?;
    if parts.is_empty() {
        return Ok(CqlValue::Null);
    }
    check_ranges("Date", &parts, 0)?;
    let value = CqlDateTime::from_parts(&parts, None).date();
    if !value.is_valid() {
        return Err(EvalError::invalid_argument("Date", format!("{value} is not a calendar date")));
    }
    Ok(CqlValue::Date(value))
}

/// `DateTime(year, ..., millisecond?, offset?)`. The offset is in hours;
/// when omitted the evaluation clock's offset applies.
pub fn datetime(args: &[CqlValue], default_offset_minutes: i16) -> EvalResult<CqlValue> {
    let (components, offset) = match args.len() {
        8 => (&args[..7], args.get(7)),
        _ => (args, None),
    };
    let parts = leading_parts("DateTime", components)?;
    if parts.is_empty() {
        return Ok(CqlValue::Null);
    }
    check_ranges("DateTime", &parts, 0)?;
    let offset = match offset {
        Some(CqlValue::Null) | None => default_offset_minutes,
        Some(value) => offset_minutes(value)?,
    };
    let value = CqlDateTime::from_parts(&parts, Some(offset));
    if !value.is_valid() {
        return Err(EvalError::invalid_argument(
            "DateTime",
            format!("{value} is not a valid datetime"),
        ));
    }
    Ok(CqlValue::DateTime(value))
}

fn offset_minutes(value: &CqlValue) -> EvalResult<i16> {
    let hours = value.as_decimal().ok_or_else(|| {
        EvalError::invalid_argument(
            "DateTime",
            format!("timezone offset must be numeric, found {}", value.get_type()),
        )
    })?;
    (hours * Decimal::from(60))
        .round()
        .to_i16()
        .filter(|m| (-14 * 60..=14 * 60).contains(m))
        .ok_or_else(|| EvalError::invalid_argument("DateTime", format!("timezone offset {hours} out of range")))
}

/// `Time(hour, minute?, second?, millisecond?)`
pub fn time(args: &[CqlValue]) -> EvalResult<CqlValue> {
    let parts = leading_parts("Time", args)?;
    if parts.is_empty() {
        return Ok(CqlValue::Null);
    }
    check_ranges("Time", &parts, 3)?;
    let mut full = vec![1970, 1, 1];
    full.extend_from_slice(&parts);
    match CqlDateTime::from_parts(&full, None).time() {
        Some(value) => Ok(CqlValue::Time(value)),
        None => Err(EvalError::invalid_argument("Time", "hour is required")),
    }
}

/// `<precision> from value`. Missing components are `Null`.
pub fn component(value: &CqlValue, precision: TemporalPrecision) -> EvalResult<CqlValue> {
    let Some(precision) = DateTimePrecision::from_unit(precision) else {
        return Err(EvalError::invalid_argument(
            "component from",
            "week is not a component",
        ));
    };
    let result = match value {
        CqlValue::Null => None,
        CqlValue::Date(d) => d.to_datetime().component(precision),
        CqlValue::DateTime(dt) => dt.component(precision),
        CqlValue::Time(t) => match precision {
            DateTimePrecision::Year | DateTimePrecision::Month | DateTimePrecision::Day => None,
            p => t.to_datetime().component(p),
        },
        other => {
            return Err(EvalError::invalid_argument(
                "component from",
                format!("expected a temporal value, found {}", other.get_type()),
            ));
        }
    };
    Ok(result.map_or(CqlValue::Null, CqlValue::Integer))
}

/// `date from`
pub fn date_from(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::DateTime(dt) => CqlValue::Date(dt.date()),
        CqlValue::Date(d) => CqlValue::Date(d.clone()),
        _ => CqlValue::Null,
    }
}

/// `time from`
pub fn time_from(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::DateTime(dt) => dt.time().map_or(CqlValue::Null, CqlValue::Time),
        _ => CqlValue::Null,
    }
}

/// `timezoneoffset from`, in hours
pub fn timezone_offset_from(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::DateTime(dt) => dt.timezone_offset.map_or(CqlValue::Null, |minutes| {
            CqlValue::Decimal(Decimal::from(minutes) / Decimal::from(60))
        }),
        _ => CqlValue::Null,
    }
}

fn span_value(span: Option<TemporalSpan>) -> CqlValue {
    let Some(span) = span else {
        return CqlValue::Null;
    };
    let (Ok(low), Ok(high)) = (i32::try_from(span.low), i32::try_from(span.high)) else {
        return CqlValue::Null;
    };
    if span.is_exact() {
        CqlValue::Integer(low)
    } else {
        // uncertain operands leave a range of answers
        CqlValue::Interval(CqlInterval::closed(
            CqlType::Integer,
            CqlValue::Integer(low),
            CqlValue::Integer(high),
        ))
    }
}

#[derive(Clone, Copy)]
enum Measure {
    Duration,
    Difference,
}

fn between(
    measure: Measure,
    unit: TemporalPrecision,
    low: &CqlValue,
    high: &CqlValue,
) -> EvalResult<CqlValue> {
    if low.is_null() || high.is_null() {
        return Ok(CqlValue::Null);
    }
    let (low, high) = promote(low.clone(), high.clone())?;
    let span = match (&low, &high, measure) {
        (CqlValue::Date(a), CqlValue::Date(b), Measure::Duration) => a.duration_between(b, unit),
        (CqlValue::Date(a), CqlValue::Date(b), Measure::Difference) => a.difference_between(b, unit),
        (CqlValue::DateTime(a), CqlValue::DateTime(b), Measure::Duration) => {
            a.duration_between(b, unit)
        }
        (CqlValue::DateTime(a), CqlValue::DateTime(b), Measure::Difference) => {
            a.difference_between(b, unit)
        }
        (CqlValue::Time(a), CqlValue::Time(b), Measure::Duration) => a.duration_between(b, unit),
        (CqlValue::Time(a), CqlValue::Time(b), Measure::Difference) => a.difference_between(b, unit),
        _ => return Err(EvalError::incompatible(&low.get_type(), &high.get_type())),
    };
    Ok(span_value(span))
}

/// `<unit>s between low and high`: whole periods elapsed
pub fn duration_between(
    unit: TemporalPrecision,
    low: &CqlValue,
    high: &CqlValue,
) -> EvalResult<CqlValue> {
    between(Measure::Duration, unit, low, high)
}

/// `difference in <unit>s between low and high`: boundaries crossed
pub fn difference_between(
    unit: TemporalPrecision,
    low: &CqlValue,
    high: &CqlValue,
) -> EvalResult<CqlValue> {
    between(Measure::Difference, unit, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlpath_types::{CqlDate, CqlTime};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ints(values: &[i32]) -> Vec<CqlValue> {
        values.iter().copied().map(CqlValue::Integer).collect()
    }

    #[test]
    fn test_date_constructor_precision() {
        assert_eq!(
            date(&ints(&[2024, 3])).unwrap(),
            CqlValue::Date(CqlDate::year_month(2024, 3))
        );
        assert_eq!(
            date(&ints(&[2024, 2, 29])).unwrap(),
            CqlValue::Date(CqlDate::new(2024, 2, 29))
        );
    }

    #[rstest]
    #[case(&[2024, 13])]
    #[case(&[2023, 2, 29])]
    #[case(&[0])]
    fn test_date_constructor_rejects_invalid(#[case] parts: &[i32]) {
        assert!(matches!(
            date(&ints(parts)),
            Err(EvalError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_datetime_offset_in_hours() {
        let mut args = ints(&[2024, 1, 1, 12, 0, 0, 0]);
        args.push(CqlValue::Decimal(Decimal::new(-55, 1)));
        let CqlValue::DateTime(dt) = datetime(&args, 0).unwrap() else {
            panic!("expected a datetime");
        };
        assert_eq!(dt.timezone_offset, Some(-330));
        assert_eq!(timezone_offset_from(&CqlValue::DateTime(dt)), CqlValue::Decimal(Decimal::new(-55, 1)));
    }

    #[test]
    fn test_time_constructor_and_components() {
        let t = time(&ints(&[14, 30])).unwrap();
        assert_eq!(t, CqlValue::Time(CqlTime::hour_minute(14, 30)));
        assert_eq!(component(&t, TemporalPrecision::Minute).unwrap(), CqlValue::Integer(30));
        assert_eq!(component(&t, TemporalPrecision::Second).unwrap(), CqlValue::Null);
        assert!(time(&ints(&[24])).is_err());
    }

    #[test]
    fn test_duration_exact_and_uncertain() {
        let a = CqlValue::Date(CqlDate::new(2000, 6, 15));
        let b = CqlValue::Date(CqlDate::new(2024, 6, 14));
        assert_eq!(
            duration_between(TemporalPrecision::Year, &a, &b).unwrap(),
            CqlValue::Integer(23)
        );
        let coarse = CqlValue::Date(CqlDate::year_only(2024));
        let result = duration_between(TemporalPrecision::Year, &a, &coarse).unwrap();
        assert!(matches!(result, CqlValue::Interval(_)));
    }

    #[test]
    fn test_difference_counts_boundaries() {
        let a = CqlValue::Date(CqlDate::new(2023, 12, 31));
        let b = CqlValue::Date(CqlDate::new(2024, 1, 1));
        assert_eq!(
            difference_between(TemporalPrecision::Year, &a, &b).unwrap(),
            CqlValue::Integer(1)
        );
        assert_eq!(
            duration_between(TemporalPrecision::Year, &a, &b).unwrap(),
            CqlValue::Integer(0)
        );
    }
}
