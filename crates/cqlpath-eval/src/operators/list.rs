//! List Operators
//!
//! Implements: Exists, Empty, First, Last, Tail, Skip, Take, Slice, IndexOf,
//! Indexer, Flatten, Distinct, SingletonFrom, membership (`in`/`contains`),
//! Includes and the list set operations. Membership and de-duplication use
//! `same_value`, so nulls match nulls.

use cqlpath_types::{CqlList, CqlValue};

use crate::error::{EvalError, EvalResult};
use crate::operators::comparison::same_value;

fn elements(value: &CqlValue) -> &[CqlValue] {
    match value {
        CqlValue::List(list) => &list.elements,
        _ => &[],
    }
}

fn list_of(items: impl IntoIterator<Item = CqlValue>) -> CqlValue {
    CqlValue::List(CqlList::from_elements(items.into_iter().collect()))
}

fn index(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// `exists`: at least one non-null element
pub fn exists(value: &CqlValue) -> CqlValue {
    let found = match value {
        CqlValue::Null => false,
        CqlValue::List(list) => list.iter().any(|e| !e.is_null()),
        _ => true,
    };
    CqlValue::Boolean(found)
}

/// FHIRPath `empty()`
pub fn empty(value: &CqlValue) -> CqlValue {
    let none = match value {
        CqlValue::Null => true,
        CqlValue::List(list) => list.is_empty(),
        _ => false,
    };
    CqlValue::Boolean(none)
}

pub fn first(value: &CqlValue) -> CqlValue {
    elements(value).first().cloned().unwrap_or(CqlValue::Null)
}

pub fn last(value: &CqlValue) -> CqlValue {
    elements(value).last().cloned().unwrap_or(CqlValue::Null)
}

pub fn tail(value: &CqlValue) -> CqlValue {
    list_of(elements(value).iter().skip(1).cloned())
}

pub fn skip(value: &CqlValue, count: i32) -> CqlValue {
    list_of(elements(value).iter().skip(index(count)).cloned())
}

pub fn take(value: &CqlValue, count: i32) -> CqlValue {
    list_of(elements(value).iter().take(index(count)).cloned())
}

/// `Slice(list, start, end?)`, end exclusive
pub fn slice(value: &CqlValue, start: i32, end: Option<i32>) -> CqlValue {
    let items = elements(value);
    let start = index(start).min(items.len());
    let end = end.map_or(items.len(), |e| index(e).min(items.len())).max(start);
    list_of(items[start..end].iter().cloned())
}

/// Position of `element`, `-1` when absent. A null element is `Null`.
pub fn index_of(value: &CqlValue, element: &CqlValue) -> CqlValue {
    if element.is_null() {
        return CqlValue::Null;
    }
    let position = elements(value)
        .iter()
        .position(|e| same_value(e, element))
        .and_then(|i| i32::try_from(i).ok())
        .unwrap_or(-1);
    CqlValue::Integer(position)
}

/// List element at `i`, `Null` when out of range
pub fn indexer(value: &CqlValue, i: i32) -> CqlValue {
    usize::try_from(i)
        .ok()
        .and_then(|i| elements(value).get(i))
        .cloned()
        .unwrap_or(CqlValue::Null)
}

/// One level of nesting removed
pub fn flatten(value: &CqlValue) -> CqlValue {
    let mut result = Vec::new();
    for item in elements(value) {
        match item {
            CqlValue::List(inner) => result.extend(inner.iter().cloned()),
            other => result.push(other.clone()),
        }
    }
    list_of(result)
}

fn dedupe(items: impl IntoIterator<Item = CqlValue>) -> Vec<CqlValue> {
    let mut result: Vec<CqlValue> = Vec::new();
    for item in items {
        if !result.iter().any(|seen| same_value(seen, &item)) {
            result.push(item);
        }
    }
    result
}

/// Order-preserving de-duplication
pub fn distinct(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::Null => CqlValue::Null,
        other => list_of(dedupe(elements(other).iter().cloned())),
    }
}

/// `singleton from`: the only element; more than one is an error
pub fn singleton_from(value: &CqlValue) -> EvalResult<CqlValue> {
    match elements(value) {
        [] => Ok(CqlValue::Null),
        [only] => Ok(only.clone()),
        many => Err(EvalError::invalid_argument(
            "singleton from",
            format!("list has {} elements", many.len()),
        )),
    }
}

/// `element in list`. A null element is found when the list holds a null.
pub fn list_contains(list: &CqlValue, element: &CqlValue) -> bool {
    elements(list).iter().any(|e| same_value(e, element))
}

/// `a includes b`: every element of `b` is in `a`
pub fn includes(a: &CqlValue, b: &CqlValue) -> CqlValue {
    match b {
        CqlValue::Null => CqlValue::Null,
        CqlValue::List(_) => {
            CqlValue::Boolean(elements(b).iter().all(|e| list_contains(a, e)))
        }
        point => CqlValue::Boolean(list_contains(a, point)),
    }
}

/// `union`: distinct elements of both; a null operand is empty
pub fn union(a: &CqlValue, b: &CqlValue) -> CqlValue {
    list_of(dedupe(elements(a).iter().chain(elements(b)).cloned()))
}

/// `intersect`: distinct elements of `a` also in `b`
pub fn intersect(a: &CqlValue, b: &CqlValue) -> CqlValue {
    if a.is_null() || b.is_null() {
        return CqlValue::Null;
    }
    list_of(dedupe(
        elements(a).iter().filter(|e| list_contains(b, e)).cloned(),
    ))
}

/// `except`: distinct elements of `a` not in `b`
pub fn except(a: &CqlValue, b: &CqlValue) -> CqlValue {
    if a.is_null() {
        return CqlValue::Null;
    }
    list_of(dedupe(
        elements(a).iter().filter(|e| !list_contains(b, e)).cloned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i32]) -> CqlValue {
        CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
    }

    #[test]
    fn test_exists_ignores_nulls() {
        assert_eq!(exists(&CqlValue::list(vec![CqlValue::Null])), CqlValue::Boolean(false));
        assert_eq!(exists(&ints(&[1])), CqlValue::Boolean(true));
        assert_eq!(exists(&CqlValue::Null), CqlValue::Boolean(false));
    }

    #[test]
    fn test_positional_access() {
        let list = ints(&[1, 2, 3, 4]);
        assert_eq!(first(&list), CqlValue::Integer(1));
        assert_eq!(last(&list), CqlValue::Integer(4));
        assert_eq!(tail(&list), ints(&[2, 3, 4]));
        assert_eq!(skip(&list, 3), ints(&[4]));
        assert_eq!(take(&list, 2), ints(&[1, 2]));
        assert_eq!(slice(&list, 1, Some(3)), ints(&[2, 3]));
        assert_eq!(first(&ints(&[])), CqlValue::Null);
        assert_eq!(index_of(&list, &CqlValue::Integer(3)), CqlValue::Integer(2));
        assert_eq!(index_of(&list, &CqlValue::Integer(9)), CqlValue::Integer(-1));
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let list = CqlValue::list(vec![
            CqlValue::Integer(2),
            CqlValue::Null,
            CqlValue::Integer(1),
            CqlValue::Integer(2),
            CqlValue::Null,
        ]);
        assert_eq!(
            distinct(&list),
            CqlValue::list(vec![CqlValue::Integer(2), CqlValue::Null, CqlValue::Integer(1)])
        );
    }

    #[test]
    fn test_singleton_from() {
        assert_eq!(singleton_from(&ints(&[7])).unwrap(), CqlValue::Integer(7));
        assert_eq!(singleton_from(&ints(&[])).unwrap(), CqlValue::Null);
        assert!(singleton_from(&ints(&[1, 2])).is_err());
    }

    #[test]
    fn test_set_operations() {
        assert_eq!(union(&ints(&[1, 2]), &ints(&[2, 3])), ints(&[1, 2, 3]));
        assert_eq!(union(&ints(&[1]), &CqlValue::Null), ints(&[1]));
        assert_eq!(intersect(&ints(&[1, 2, 3]), &ints(&[3, 2])), ints(&[2, 3]));
        assert_eq!(except(&ints(&[1, 2, 3]), &ints(&[2])), ints(&[1, 3]));
        assert_eq!(includes(&ints(&[1, 2, 3]), &ints(&[1, 3])), CqlValue::Boolean(true));
    }

    #[test]
    fn test_null_membership() {
        let with_null = CqlValue::list(vec![CqlValue::Integer(1), CqlValue::Null]);
        assert!(list_contains(&with_null, &CqlValue::Null));
        assert!(!list_contains(&ints(&[1]), &CqlValue::Null));
    }

    #[test]
    fn test_flatten_one_level() {
        let nested = CqlValue::list(vec![ints(&[1, 2]), CqlValue::Integer(3), ints(&[4])]);
        assert_eq!(flatten(&nested), ints(&[1, 2, 3, 4]));
    }
}
