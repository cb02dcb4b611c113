//! Aggregate Functions
//!
//! Implements: Count, Sum, Min, Max, Avg, Median, Mode, Product,
//! GeometricMean, Variance, StdDev, PopulationVariance, PopulationStdDev,
//! AllTrue and AnyTrue. Null elements are ignored throughout; apart from
//! Count, AllTrue and AnyTrue an input without non-null elements is `Null`.

use std::cmp::Ordering;

use cqlpath_types::CqlValue;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{EvalError, EvalResult};
use crate::operators::arithmetic::{self, from_f64};
use crate::operators::comparison::{compare, same_value};

fn present(source: &CqlValue) -> Vec<&CqlValue> {
    match source {
        CqlValue::List(list) => list.iter().filter(|v| !v.is_null()).collect(),
        CqlValue::Null => Vec::new(),
        single => vec![single],
    }
}

fn fold(
    source: &CqlValue,
    step: fn(&CqlValue, &CqlValue) -> EvalResult<CqlValue>,
) -> EvalResult<CqlValue> {
    let mut items = present(source).into_iter();
    let Some(first) = items.next() else {
        return Ok(CqlValue::Null);
    };
    let mut acc = first.clone();
    for item in items {
        acc = step(&acc, item)?;
    }
    Ok(acc)
}

pub fn count(source: &CqlValue) -> CqlValue {
    CqlValue::Integer(i32::try_from(present(source).len()).unwrap_or(i32::MAX))
}

pub fn sum(source: &CqlValue) -> EvalResult<CqlValue> {
    fold(source, arithmetic::add)
}

pub fn product(source: &CqlValue) -> EvalResult<CqlValue> {
    fold(source, arithmetic::multiply)
}

fn extreme(source: &CqlValue, keep: Ordering) -> EvalResult<CqlValue> {
    let mut best: Option<&CqlValue> = None;
    for item in present(source) {
        best = match best {
            None => Some(item),
            Some(current) => match compare(item, current)? {
                Some(ordering) if ordering == keep => Some(item),
                _ => Some(current),
            },
        };
    }
    Ok(best.cloned().unwrap_or(CqlValue::Null))
}

pub fn min(source: &CqlValue) -> EvalResult<CqlValue> {
    extreme(source, Ordering::Less)
}

pub fn max(source: &CqlValue) -> EvalResult<CqlValue> {
    extreme(source, Ordering::Greater)
}

pub fn avg(source: &CqlValue) -> EvalResult<CqlValue> {
    let total = sum(source)?;
    if total.is_null() {
        return Ok(CqlValue::Null);
    }
    arithmetic::divide(&total, &count(source))
}

fn sorted(source: &CqlValue) -> EvalResult<Vec<CqlValue>> {
    let mut values: Vec<CqlValue> = present(source).into_iter().cloned().collect();
    let mut failure = None;
    values.sort_by(|a, b| match compare(a, b) {
        Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(values),
    }
}

pub fn median(source: &CqlValue) -> EvalResult<CqlValue> {
    let values = sorted(source)?;
    let mid = values.len() / 2;
    match values.len() {
        0 => Ok(CqlValue::Null),
        n if n % 2 == 1 => Ok(values[mid].clone()),
        _ => {
            let pair = arithmetic::add(&values[mid - 1], &values[mid])?;
            arithmetic::divide(&pair, &CqlValue::Integer(2))
        }
    }
}

/// Most frequent value; ties go to the first one seen
pub fn mode(source: &CqlValue) -> CqlValue {
    let mut counts: Vec<(&CqlValue, usize)> = Vec::new();
    for item in present(source) {
        match counts.iter_mut().find(|entry| same_value(entry.0, item)) {
            Some(entry) => entry.1 += 1,
            None => counts.push((item, 1)),
        }
    }
    let mut best: Option<(&CqlValue, usize)> = None;
    for (value, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map_or(CqlValue::Null, |(value, _)| value.clone())
}

fn decimals(source: &CqlValue) -> EvalResult<Vec<Decimal>> {
    present(source)
        .into_iter()
        .map(|v| {
            v.as_decimal().ok_or_else(|| {
                EvalError::invalid_argument(
                    "aggregate",
                    format!("expected a numeric element, found {}", v.get_type()),
                )
            })
        })
        .collect()
}

pub fn geometric_mean(source: &CqlValue) -> EvalResult<CqlValue> {
    let values = decimals(source)?;
    if values.is_empty() {
        return Ok(CqlValue::Null);
    }
    let mut log_sum = 0.0;
    for v in &values {
        match v.to_f64() {
            Some(f) if f > 0.0 => log_sum += f.ln(),
            _ => return Ok(CqlValue::Null),
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    Ok(from_f64((log_sum / n).exp()).map_or(CqlValue::Null, CqlValue::Decimal))
}

/// Sum of squared deviations divided by `n - correction`
fn spread(source: &CqlValue, correction: usize) -> EvalResult<Option<Decimal>> {
    let values = decimals(source)?;
    let n = values.len();
    if n == 0 || n <= correction {
        return Ok(None);
    }
    let total: Decimal = values.iter().sum();
    let mean = total / Decimal::from(n);
    let squares: Decimal = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Ok(squares.checked_div(Decimal::from(n - correction)))
}

pub fn variance(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(spread(source, 1)?.map_or(CqlValue::Null, CqlValue::Decimal))
}

pub fn population_variance(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(spread(source, 0)?.map_or(CqlValue::Null, CqlValue::Decimal))
}

pub fn std_dev(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(arithmetic::sqrt(&variance(source)?))
}

pub fn population_std_dev(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(arithmetic::sqrt(&population_variance(source)?))
}

fn truths(source: &CqlValue) -> EvalResult<Vec<bool>> {
    present(source)
        .into_iter()
        .map(|v| {
            v.as_boolean().ok_or_else(|| {
                EvalError::invalid_argument(
                    "aggregate",
                    format!("expected a Boolean element, found {}", v.get_type()),
                )
            })
        })
        .collect()
}

/// Empty input is vacuously `true`
pub fn all_true(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(CqlValue::Boolean(truths(source)?.into_iter().all(|b| b)))
}

/// Empty input is `false`
pub fn any_true(source: &CqlValue) -> EvalResult<CqlValue> {
    Ok(CqlValue::Boolean(truths(source)?.into_iter().any(|b| b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlpath_types::CqlQuantity;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i32]) -> CqlValue {
        CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
    }

    fn dec(s: &str) -> CqlValue {
        CqlValue::Decimal(s.parse().unwrap())
    }

    #[test]
    fn test_empty_input_contract() {
        let empty = ints(&[]);
        assert_eq!(count(&empty), CqlValue::Integer(0));
        assert_eq!(sum(&empty).unwrap(), CqlValue::Null);
        assert_eq!(avg(&empty).unwrap(), CqlValue::Null);
        assert_eq!(min(&empty).unwrap(), CqlValue::Null);
        assert_eq!(max(&empty).unwrap(), CqlValue::Null);
        assert_eq!(all_true(&empty).unwrap(), CqlValue::Boolean(true));
        assert_eq!(any_true(&empty).unwrap(), CqlValue::Boolean(false));
    }

    #[test]
    fn test_nulls_are_ignored() {
        let list = CqlValue::list(vec![CqlValue::Integer(1), CqlValue::Null, CqlValue::Integer(3)]);
        assert_eq!(count(&list), CqlValue::Integer(2));
        assert_eq!(sum(&list).unwrap(), CqlValue::Integer(4));
        assert_eq!(avg(&list).unwrap(), dec("2"));
        let all_null = CqlValue::list(vec![CqlValue::Null, CqlValue::Null]);
        assert_eq!(sum(&all_null).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_order_statistics() {
        assert_eq!(min(&ints(&[4, 2, 9])).unwrap(), CqlValue::Integer(2));
        assert_eq!(max(&ints(&[4, 2, 9])).unwrap(), CqlValue::Integer(9));
        assert_eq!(median(&ints(&[5, 1, 3])).unwrap(), CqlValue::Integer(3));
        assert_eq!(median(&ints(&[4, 1, 3, 2])).unwrap(), dec("2.5"));
        assert_eq!(mode(&ints(&[1, 2, 2, 3, 3])), CqlValue::Integer(2));
    }

    #[test]
    fn test_spread_statistics() {
        let list = ints(&[1, 2, 3, 4, 5]);
        assert_eq!(variance(&list).unwrap(), dec("2.5"));
        assert_eq!(population_variance(&list).unwrap(), dec("2"));
        assert_eq!(variance(&ints(&[7])).unwrap(), CqlValue::Null);
        assert_eq!(product(&ints(&[2, 3, 4])).unwrap(), CqlValue::Integer(24));
        assert_eq!(geometric_mean(&ints(&[2, 8])).unwrap(), dec("4"));
    }

    #[test]
    fn test_quantity_sum_converts_units() {
        let list = CqlValue::list(vec![
            CqlValue::Quantity(CqlQuantity::new(Decimal::ONE, "g")),
            CqlValue::Quantity(CqlQuantity::new(Decimal::from(500), "mg")),
        ]);
        assert_eq!(
            sum(&list).unwrap(),
            CqlValue::Quantity(CqlQuantity::new(Decimal::new(15, 1), "g"))
        );
    }
}
