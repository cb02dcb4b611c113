//! Clinical Operators
//!
//! Implements: CalculateAgeInYears/Months/Weeks/Days/Hours/Minutes/Seconds
//! and their `At` forms, plus code membership in a list of codes or a
//! concept.

use cqlpath_ast::TemporalPrecision;
use cqlpath_types::{CqlCode, CqlValue};

use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::operators::datetime::duration_between;

/// Age unit named by a `CalculateAgeIn<Unit>s` function
pub fn age_unit(function_name: &str) -> Option<TemporalPrecision> {
    let rest = function_name
        .strip_prefix("CalculateAgeIn")?
        .trim_end_matches("At");
    TemporalPrecision::from_keyword(&rest.to_ascii_lowercase())
}

/// Whole units from `birth` to `as_of`. A birth date too coarse for the
/// unit gives `Null` rather than a range.
pub fn calculate_age_at(
    unit: TemporalPrecision,
    birth: &CqlValue,
    as_of: &CqlValue,
) -> EvalResult<CqlValue> {
    let as_of = match (birth, as_of) {
        // a Date birth date is measured against the calendar date
        (CqlValue::Date(_), CqlValue::DateTime(now)) => CqlValue::Date(now.date()),
        // and a partial DateTime at its own precision
        (CqlValue::DateTime(b), CqlValue::DateTime(now)) if b.precision() < now.precision() => {
            CqlValue::DateTime(now.truncate(b.precision()))
        }
        (_, other) => other.clone(),
    };
    match birth {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Date(_) | CqlValue::DateTime(_) => {
            match duration_between(unit, birth, &as_of)? {
                age @ CqlValue::Integer(_) => Ok(age),
                _ => Ok(CqlValue::Null),
            }
        }
        other => Err(EvalError::invalid_argument(
            "CalculateAge",
            format!("expected a Date or DateTime birth date, found {}", other.get_type()),
        )),
    }
}

/// Age against the evaluation clock
pub fn calculate_age(
    unit: TemporalPrecision,
    birth: &CqlValue,
    ctx: &EvaluationContext,
) -> EvalResult<CqlValue> {
    calculate_age_at(unit, birth, &CqlValue::DateTime(ctx.now()))
}

/// Whether `code` is equivalent to any code in `codes` (a Code, a Concept
/// or a list of either)
pub fn code_in(code: &CqlCode, codes: &CqlValue) -> bool {
    match codes {
        CqlValue::Code(c) => c.is_equivalent(code),
        CqlValue::Concept(concept) => concept.contains_equivalent(code),
        CqlValue::List(list) => list.iter().any(|item| code_in(code, item)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use cqlpath_types::{CqlConcept, CqlDate, CqlDateTime};
    use pretty_assertions::assert_eq;

    fn fixed_context() -> EvaluationContext {
        let clock = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap();
        EvaluationContext::builder().clock(clock).build()
    }

    #[test]
    fn test_age_unit_from_name() {
        assert_eq!(age_unit("CalculateAgeInYears"), Some(TemporalPrecision::Year));
        assert_eq!(age_unit("CalculateAgeInMonthsAt"), Some(TemporalPrecision::Month));
        assert_eq!(age_unit("Foo"), None);
    }

    #[test]
    fn test_age_against_clock() {
        let ctx = fixed_context();
        let birth = CqlValue::Date(CqlDate::new(2000, 6, 16));
        assert_eq!(
            calculate_age(TemporalPrecision::Year, &birth, &ctx).unwrap(),
            CqlValue::Integer(23)
        );
        let birthday = CqlValue::Date(CqlDate::new(2000, 6, 15));
        assert_eq!(
            calculate_age(TemporalPrecision::Year, &birthday, &ctx).unwrap(),
            CqlValue::Integer(24)
        );
    }

    #[test]
    fn test_partial_datetime_birth_date_is_exact() {
        let ctx = fixed_context();
        let birth = CqlValue::DateTime(CqlDateTime::from_parts(&[2000, 6, 15], Some(0)));
        assert_eq!(
            calculate_age(TemporalPrecision::Year, &birth, &ctx).unwrap(),
            CqlValue::Integer(24)
        );
    }

    #[test]
    fn test_coarse_birth_date_in_days_is_null() {
        let ctx = fixed_context();
        let birth = CqlValue::Date(CqlDate::year_only(2000));
        assert_eq!(
            calculate_age(TemporalPrecision::Day, &birth, &ctx).unwrap(),
            CqlValue::Null
        );
    }

    #[test]
    fn test_code_membership() {
        let code = CqlCode::new("8480-6", "http://loinc.org");
        let concept = CqlValue::Concept(CqlConcept::new(
            [CqlCode::new("8480-6", "http://loinc.org").with_display("Systolic")],
            None,
        ));
        assert!(code_in(&code, &concept));
        assert!(!code_in(&CqlCode::new("x", "http://loinc.org"), &concept));
    }
}
