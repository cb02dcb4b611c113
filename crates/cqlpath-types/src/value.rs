//! CQL runtime values
//!
//! `CqlValue` is the single currency of evaluation: every intermediate and
//! final result is one. Values are immutable once built; operations return
//! new values.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::coercion::{CoercionError, CoercionResult, promote};
use crate::{CqlDate, CqlDateTime, CqlQuantity, CqlRatio, CqlTime, CqlType};

/// A CQL runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CqlValue {
    /// Absence of information; distinct from `{}` and `''`
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
    String(String),

    Date(CqlDate),
    DateTime(CqlDateTime),
    Time(CqlTime),

    Quantity(CqlQuantity),
    Ratio(CqlRatio),
    Code(CqlCode),
    Concept(CqlConcept),

    List(CqlList),
    Interval(CqlInterval),
    Tuple(CqlTuple),
}

impl CqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Self::Boolean(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Self::Boolean(false))
    }

    pub fn get_type(&self) -> CqlType {
        match self {
            Self::Null => CqlType::Any,
            Self::Boolean(_) => CqlType::Boolean,
            Self::Integer(_) => CqlType::Integer,
            Self::Long(_) => CqlType::Long,
            Self::Decimal(_) => CqlType::Decimal,
            Self::String(_) => CqlType::String,
            Self::Date(_) => CqlType::Date,
            Self::DateTime(_) => CqlType::DateTime,
            Self::Time(_) => CqlType::Time,
            Self::Quantity(_) => CqlType::Quantity,
            Self::Ratio(_) => CqlType::Ratio,
            Self::Code(_) => CqlType::Code,
            Self::Concept(_) => CqlType::Concept,
            Self::List(list) => CqlType::list(list.element_type.clone()),
            Self::Interval(interval) => CqlType::interval(interval.point_type.clone()),
            Self::Tuple(tuple) => CqlType::Tuple(
                tuple
                    .iter()
                    .map(|(name, value)| crate::TupleTypeElement::new(name.clone(), value.get_type()))
                    .collect(),
            ),
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer or Long widened to i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(l) => Some(*l),
            Self::Integer(i) => Some(i64::from(*i)),
            _ => None,
        }
    }

    /// Any numeric widened to Decimal
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Long(l) => Some(Decimal::from(*l)),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&CqlList> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_interval(&self) -> Option<&CqlInterval> {
        match self {
            Self::Interval(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&CqlTuple> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn null() -> Self {
        Self::Null
    }

    pub fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    pub fn integer(value: i32) -> Self {
        Self::Integer(value)
    }

    pub fn long(value: i64) -> Self {
        Self::Long(value)
    }

    pub fn decimal(value: Decimal) -> Self {
        Self::Decimal(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn list(elements: Vec<CqlValue>) -> Self {
        Self::List(CqlList::from_elements(elements))
    }

    /// Three-valued boolean from an optional answer
    pub fn from_option_bool(value: Option<bool>) -> Self {
        value.map_or(Self::Null, Self::Boolean)
    }

    /// Elements of a list; `[]` for null; a singleton for anything else
    pub fn into_elements(self) -> Vec<CqlValue> {
        match self {
            Self::Null => Vec::new(),
            Self::List(list) => list.elements,
            other => vec![other],
        }
    }

    /// Smallest value of an ordered type
    pub fn minimum(point_type: &CqlType) -> Option<CqlValue> {
        Some(match point_type {
            CqlType::Integer => Self::Integer(i32::MIN),
            CqlType::Long => Self::Long(i64::MIN),
            CqlType::Decimal => Self::Decimal(min_decimal()),
            CqlType::Date => Self::Date(CqlDate::new(1, 1, 1)),
            CqlType::DateTime => Self::DateTime(CqlDateTime::new(1, 1, 1, 0, 0, 0, 0)),
            CqlType::Time => Self::Time(CqlTime::new(0, 0, 0, 0)),
            _ => return None,
        })
    }

    /// Largest value of an ordered type
    pub fn maximum(point_type: &CqlType) -> Option<CqlValue> {
        Some(match point_type {
            CqlType::Integer => Self::Integer(i32::MAX),
            CqlType::Long => Self::Long(i64::MAX),
            CqlType::Decimal => Self::Decimal(max_decimal()),
            CqlType::Date => Self::Date(CqlDate::new(9999, 12, 31)),
            CqlType::DateTime => Self::DateTime(CqlDateTime::new(9999, 12, 31, 23, 59, 59, 999)),
            CqlType::Time => Self::Time(CqlTime::new(23, 59, 59, 999)),
            _ => return None,
        })
    }
}

/// `99999999999999999999.99999999`
pub fn max_decimal() -> Decimal {
    Decimal::from_i128_with_scale(9_999_999_999_999_999_999_999_999_999, 8)
}

pub fn min_decimal() -> Decimal {
    -max_decimal()
}

impl fmt::Display for CqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Date(d) => write!(f, "@{d}"),
            Self::DateTime(dt) => write!(f, "@{dt}"),
            Self::Time(t) => write!(f, "@T{t}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Ratio(r) => write!(f, "{r}"),
            Self::Code(c) => write!(f, "{c}"),
            Self::Concept(c) => write!(f, "{c}"),
            Self::List(l) => write!(f, "{l}"),
            Self::Interval(i) => write!(f, "{i}"),
            Self::Tuple(t) => write!(f, "{t}"),
        }
    }
}

impl From<bool> for CqlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for CqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<i64> for CqlValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<Decimal> for CqlValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for CqlValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CqlValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

// ============================================================================
// Clinical Types
// ============================================================================

/// A code from a code system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlCode {
    pub code: String,
    /// Code system URI; empty when unknown
    pub system: String,
    pub version: Option<String>,
    pub display: Option<String>,
}

impl CqlCode {
    pub fn new(code: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            version: None,
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Same code in the same system; version and display ignored
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.code == other.code && self.system == other.system
    }
}

impl fmt::Display for CqlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code '{}' from \"{}\"", self.code, self.system)?;
        if let Some(display) = &self.display {
            write!(f, " display '{display}'")?;
        }
        Ok(())
    }
}

/// A set of codes meaning the same thing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlConcept {
    pub codes: SmallVec<[CqlCode; 2]>,
    pub display: Option<String>,
}

impl CqlConcept {
    pub fn new(codes: impl IntoIterator<Item = CqlCode>, display: Option<String>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            display,
        }
    }

    pub fn from_code(code: CqlCode) -> Self {
        let display = code.display.clone();
        Self {
            codes: smallvec::smallvec![code],
            display,
        }
    }

    pub fn contains_equivalent(&self, code: &CqlCode) -> bool {
        self.codes.iter().any(|c| c.is_equivalent(code))
    }

    /// Concepts are equivalent when they share any code
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.codes.iter().any(|c| other.contains_equivalent(c))
    }
}

impl fmt::Display for CqlConcept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Concept { ")?;
        for (i, code) in self.codes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{code}")?;
        }
        f.write_str(" }")?;
        if let Some(display) = &self.display {
            write!(f, " display '{display}'")?;
        }
        Ok(())
    }
}

// ============================================================================
// Collection Types
// ============================================================================

/// Ordered list; the element type is inferred from its members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CqlList {
    pub element_type: CqlType,
    pub elements: Vec<CqlValue>,
}

impl CqlList {
    pub fn new(element_type: CqlType) -> Self {
        Self {
            element_type,
            elements: Vec::new(),
        }
    }

    /// Build a list, inferring the common element type of non-null members
    pub fn from_elements(elements: Vec<CqlValue>) -> Self {
        let element_type = elements
            .iter()
            .filter(|e| !e.is_null())
            .map(CqlValue::get_type)
            .reduce(|acc, t| acc.common_supertype(&t))
            .unwrap_or(CqlType::Any);
        Self {
            element_type,
            elements,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, index: usize) -> Option<&CqlValue> {
        self.elements.get(index)
    }

    pub fn first(&self) -> Option<&CqlValue> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&CqlValue> {
        self.elements.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CqlValue> {
        self.elements.iter()
    }
}

impl PartialEq for CqlList {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl IntoIterator for CqlList {
    type Item = CqlValue;
    type IntoIter = std::vec::IntoIter<CqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a CqlList {
    type Item = &'a CqlValue;
    type IntoIter = std::slice::Iter<'a, CqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl FromIterator<CqlValue> for CqlList {
    fn from_iter<I: IntoIterator<Item = CqlValue>>(iter: I) -> Self {
        Self::from_elements(iter.into_iter().collect())
    }
}

impl fmt::Display for CqlList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, e) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{e}")?;
        }
        f.write_str(" }")
    }
}

/// Named fields. Equality ignores field order; display keeps insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CqlTuple {
    pub elements: IndexMap<String, CqlValue>,
}

impl CqlTuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements<S: Into<String>>(elements: impl IntoIterator<Item = (S, CqlValue)>) -> Self {
        Self {
            elements: elements.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CqlValue> {
        self.elements.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: CqlValue) {
        self.elements.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, CqlValue> {
        self.elements.iter()
    }
}

impl fmt::Display for CqlTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tuple { ")?;
        for (i, (name, value)) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str(" }")
    }
}

/// Interval over an ordered point type. A missing bound is unbounded on
/// that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqlInterval {
    pub point_type: CqlType,
    pub low: Option<Box<CqlValue>>,
    pub low_closed: bool,
    pub high: Option<Box<CqlValue>>,
    pub high_closed: bool,
}

impl CqlInterval {
    /// Build without checking bound types. `Null` bounds become unbounded.
    pub fn new(
        point_type: CqlType,
        low: Option<CqlValue>,
        low_closed: bool,
        high: Option<CqlValue>,
        high_closed: bool,
    ) -> Self {
        Self {
            point_type,
            low: low.filter(|v| !v.is_null()).map(Box::new),
            low_closed,
            high: high.filter(|v| !v.is_null()).map(Box::new),
            high_closed,
        }
    }

    /// Build from bounds, promoting them onto one point type.
    /// `IncompatibleType` when the bounds share no type family.
    pub fn try_new(
        low: CqlValue,
        low_closed: bool,
        high: CqlValue,
        high_closed: bool,
    ) -> CoercionResult<Self> {
        let (low, high) = match (low.is_null(), high.is_null()) {
            (false, false) => promote(low, high)?,
            _ => (low, high),
        };
        let point_type = if low.is_null() {
            high.get_type()
        } else {
            low.get_type()
        };
        if !point_type.is_any() && !point_type.is_ordered() {
            return Err(CoercionError::IncompatibleType {
                left: point_type.to_string(),
                right: "Interval point".to_string(),
            });
        }
        Ok(Self::new(point_type, Some(low), low_closed, Some(high), high_closed))
    }

    pub fn closed(point_type: CqlType, low: CqlValue, high: CqlValue) -> Self {
        Self::new(point_type, Some(low), true, Some(high), true)
    }

    pub fn low(&self) -> Option<&CqlValue> {
        self.low.as_deref()
    }

    pub fn high(&self) -> Option<&CqlValue> {
        self.high.as_deref()
    }
}

impl fmt::Display for CqlInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low_closed { '[' } else { '(' };
        let close = if self.high_closed { ']' } else { ')' };
        let bound = |b: Option<&CqlValue>| b.map_or_else(|| "null".to_string(), ToString::to_string);
        write!(
            f,
            "Interval{open}{}, {}{close}",
            bound(self.low()),
            bound(self.high())
        )
    }
}
