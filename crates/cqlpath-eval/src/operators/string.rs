//! String Operators
//!
//! Implements: Concatenate (`+` and `&`), Combine, Split, Length, Upper,
//! Lower, Substring, PositionOf, LastPositionOf, StartsWith, EndsWith,
//! Matches, ReplaceMatches, Trim and Indexer. Positions count characters,
//! not bytes, and start at 0.

use cqlpath_types::CqlValue;
use regex::Regex;

use crate::error::{EvalError, EvalResult};

fn expect_string<'a>(operation: &str, value: &'a CqlValue) -> EvalResult<Option<&'a str>> {
    match value {
        CqlValue::Null => Ok(None),
        CqlValue::String(s) => Ok(Some(s)),
        other => Err(EvalError::invalid_argument(
            operation,
            format!("expected String, found {}", other.get_type()),
        )),
    }
}

fn char_count(s: &str) -> i32 {
    i32::try_from(s.chars().count()).unwrap_or(i32::MAX)
}

/// Char index of a byte offset
fn char_index(s: &str, byte_offset: usize) -> i32 {
    char_count(&s[..byte_offset])
}

/// `&`: null operands count as empty strings
pub fn concatenate(values: &[CqlValue]) -> EvalResult<CqlValue> {
    let mut result = String::new();
    for value in values {
        if let Some(s) = expect_string("Concatenate", value)? {
            result.push_str(s);
        }
    }
    Ok(CqlValue::String(result))
}

/// `Combine(list, separator)`. Null elements are skipped; a list with no
/// strings combines to `Null`.
pub fn combine(source: &CqlValue, separator: Option<&CqlValue>) -> EvalResult<CqlValue> {
    let CqlValue::List(list) = source else {
        return Ok(CqlValue::Null);
    };
    let separator = match separator {
        Some(sep) => match expect_string("Combine", sep)? {
            Some(s) => s,
            None => return Ok(CqlValue::Null),
        },
        None => "",
    };
    let mut parts = Vec::with_capacity(list.len());
    for item in list.iter() {
        if let Some(s) = expect_string("Combine", item)? {
            parts.push(s);
        }
    }
    if parts.is_empty() {
        return Ok(CqlValue::Null);
    }
    Ok(CqlValue::String(parts.join(separator)))
}

/// `Split(string, separator)`. An empty separator leaves the string whole.
pub fn split(value: &str, separator: &str) -> CqlValue {
    let parts = if separator.is_empty() {
        vec![CqlValue::string(value)]
    } else {
        value.split(separator).map(CqlValue::string).collect()
    };
    CqlValue::list(parts)
}

/// `Length`: characters of a string, elements of a list
pub fn length(value: &CqlValue) -> CqlValue {
    match value {
        CqlValue::String(s) => CqlValue::Integer(char_count(s)),
        CqlValue::List(l) => CqlValue::Integer(i32::try_from(l.len()).unwrap_or(i32::MAX)),
        _ => CqlValue::Null,
    }
}

pub fn upper(value: &str) -> CqlValue {
    CqlValue::string(value.to_uppercase())
}

pub fn lower(value: &str) -> CqlValue {
    CqlValue::string(value.to_lowercase())
}

pub fn trim(value: &str) -> CqlValue {
    CqlValue::string(value.trim())
}

/// `Substring(string, start, length?)`. Out-of-range starts are `Null`;
/// lengths past the end are clipped.
pub fn substring(value: &str, start: i32, length: Option<i32>) -> CqlValue {
    let chars: Vec<char> = value.chars().collect();
    let Ok(start) = usize::try_from(start) else {
        return CqlValue::Null;
    };
    if start >= chars.len() {
        return CqlValue::Null;
    }
    let end = match length {
        Some(len) => match usize::try_from(len) {
            Ok(len) => start.saturating_add(len).min(chars.len()),
            Err(_) => return CqlValue::Null,
        },
        None => chars.len(),
    };
    CqlValue::String(chars[start..end].iter().collect())
}

pub fn starts_with(value: &str, prefix: &str) -> CqlValue {
    CqlValue::Boolean(value.starts_with(prefix))
}

pub fn ends_with(value: &str, suffix: &str) -> CqlValue {
    CqlValue::Boolean(value.ends_with(suffix))
}

/// `PositionOf(pattern, string)`: first char index, `-1` when absent
pub fn position_of(pattern: &str, value: &str) -> CqlValue {
    CqlValue::Integer(value.find(pattern).map_or(-1, |i| char_index(value, i)))
}

/// `LastPositionOf(pattern, string)`: last char index, `-1` when absent
pub fn last_position_of(pattern: &str, value: &str) -> CqlValue {
    CqlValue::Integer(value.rfind(pattern).map_or(-1, |i| char_index(value, i)))
}

/// Character at `index`, `Null` when out of range
pub fn indexer(value: &str, index: i32) -> CqlValue {
    usize::try_from(index)
        .ok()
        .and_then(|i| value.chars().nth(i))
        .map_or(CqlValue::Null, |c| CqlValue::String(c.to_string()))
}

fn compile(pattern: &str, anchored: bool) -> EvalResult<Regex> {
    let source = if anchored {
        format!("^(?:{pattern})$")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|e| EvalError::invalid_regex(pattern, e.to_string()))
}

/// `Matches(string, pattern)`: the whole string must match
pub fn matches(value: &str, pattern: &str) -> EvalResult<CqlValue> {
    Ok(CqlValue::Boolean(compile(pattern, true)?.is_match(value)))
}

/// `ReplaceMatches(string, pattern, substitution)`. `$1` in the
/// substitution refers to capture groups.
pub fn replace_matches(value: &str, pattern: &str, substitution: &str) -> EvalResult<CqlValue> {
    let regex = compile(pattern, false)?;
    Ok(CqlValue::String(regex.replace_all(value, substitution).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_concatenate_treats_null_as_empty() {
        let result = concatenate(&[CqlValue::string("a"), CqlValue::Null, CqlValue::string("b")]).unwrap();
        assert_eq!(result, CqlValue::string("ab"));
    }

    #[test]
    fn test_combine_skips_nulls() {
        let list = CqlValue::list(vec![CqlValue::string("a"), CqlValue::Null, CqlValue::string("c")]);
        assert_eq!(
            combine(&list, Some(&CqlValue::string("-"))).unwrap(),
            CqlValue::string("a-c")
        );
        assert_eq!(combine(&CqlValue::list(vec![]), None).unwrap(), CqlValue::Null);
    }

    #[rstest]
    #[case("hello", 1, Some(3), CqlValue::string("ell"))]
    #[case("hello", 3, None, CqlValue::string("lo"))]
    #[case("hello", 2, Some(100), CqlValue::string("llo"))]
    #[case("hello", 5, None, CqlValue::Null)]
    #[case("hello", -1, None, CqlValue::Null)]
    fn test_substring(
        #[case] value: &str,
        #[case] start: i32,
        #[case] len: Option<i32>,
        #[case] expected: CqlValue,
    ) {
        assert_eq!(substring(value, start, len), expected);
    }

    #[test]
    fn test_positions_count_characters() {
        assert_eq!(position_of("b", "äbcb"), CqlValue::Integer(1));
        assert_eq!(last_position_of("b", "äbcb"), CqlValue::Integer(3));
        assert_eq!(position_of("z", "abc"), CqlValue::Integer(-1));
    }

    #[test]
    fn test_matches_is_whole_string() {
        assert_eq!(matches("123", r"\d+").unwrap(), CqlValue::Boolean(true));
        assert_eq!(matches("a123", r"\d+").unwrap(), CqlValue::Boolean(false));
        assert!(matches!(matches("x", "("), Err(EvalError::InvalidRegex { .. })));
    }

    #[test]
    fn test_replace_matches_with_groups() {
        assert_eq!(
            replace_matches("John Smith", r"(\w+) (\w+)", "$2, $1").unwrap(),
            CqlValue::string("Smith, John")
        );
    }

    #[test]
    fn test_split_and_length() {
        let parts = split("a,b,,c", ",");
        assert_eq!(length(&parts), CqlValue::Integer(4));
        assert_eq!(length(&CqlValue::string("héllo")), CqlValue::Integer(5));
        assert_eq!(indexer("abc", 1), CqlValue::string("b"));
        assert_eq!(indexer("abc", 3), CqlValue::Null);
    }
}
