//! Operator kinds for CQL and FHIRPath expressions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Logical
    And,
    Or,
    Xor,
    Implies,

    // Membership
    In,
    Contains,

    // Equality
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,

    // Comparison
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,

    // Set (`|` in FHIRPath is Union)
    Union,
    Intersect,
    Except,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    /// `div`
    TruncatedDivide,
    /// `mod`
    Modulo,
    /// `^`
    Power,
    /// `&` (nulls treated as empty strings)
    Concatenate,
}

impl BinaryOp {
    /// Logical operators evaluate through three-valued tables rather than
    /// propagating null.
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Implies)
    }

    /// Operators that are defined when an operand is null.
    pub fn is_null_tolerant(&self) -> bool {
        self.is_logical()
            || matches!(
                self,
                Self::Equivalent
                    | Self::NotEquivalent
                    | Self::Concatenate
                    | Self::Union
                    | Self::In
                    | Self::Contains
            )
    }

    /// CQL surface symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Implies => "implies",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::NotEquivalent => "!~",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Union => "union",
            Self::Intersect => "intersect",
            Self::Except => "except",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::TruncatedDivide => "div",
            Self::Modulo => "mod",
            Self::Power => "^",
            Self::Concatenate => "&",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Exists,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    Distinct,
    Flatten,
    Collapse,
    SingletonFrom,
    /// `start of`
    Start,
    /// `end of`
    End,
    /// `width of`
    Width,
    /// `size of`
    Size,
    /// `point from`
    PointFrom,
    Successor,
    Predecessor,
}

impl UnaryOp {
    /// Null tests and list operators see null operands instead of
    /// short-circuiting to null.
    pub fn is_null_tolerant(&self) -> bool {
        matches!(
            self,
            Self::IsNull
                | Self::IsNotNull
                | Self::IsTrue
                | Self::IsFalse
                | Self::Exists
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Negate => "-",
            Self::Exists => "exists",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
            Self::IsTrue => "is true",
            Self::IsFalse => "is false",
            Self::Distinct => "distinct",
            Self::Flatten => "flatten",
            Self::Collapse => "collapse",
            Self::SingletonFrom => "singleton from",
            Self::Start => "start of",
            Self::End => "end of",
            Self::Width => "width of",
            Self::Size => "size of",
            Self::PointFrom => "point from",
            Self::Successor => "successor of",
            Self::Predecessor => "predecessor of",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Timing and interval relationship operators. Each may carry a precision
/// (`same day as`, `before month of`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalOp {
    Before,
    After,
    Meets,
    MeetsBefore,
    MeetsAfter,
    Overlaps,
    OverlapsBefore,
    OverlapsAfter,
    Starts,
    Ends,
    Includes,
    /// `included in` / `during`
    IncludedIn,
    ProperlyIncludes,
    ProperlyIncludedIn,
    SameAs,
    SameOrBefore,
    SameOrAfter,
}

impl fmt::Display for IntervalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Meets => "meets",
            Self::MeetsBefore => "meets before",
            Self::MeetsAfter => "meets after",
            Self::Overlaps => "overlaps",
            Self::OverlapsBefore => "overlaps before",
            Self::OverlapsAfter => "overlaps after",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Includes => "includes",
            Self::IncludedIn => "included in",
            Self::ProperlyIncludes => "properly includes",
            Self::ProperlyIncludedIn => "properly included in",
            Self::SameAs => "same as",
            Self::SameOrBefore => "same or before",
            Self::SameOrAfter => "same or after",
        };
        f.write_str(s)
    }
}

/// Temporal precision keywords used by timing operators, component
/// extraction and `duration`/`difference` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemporalPrecision {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TemporalPrecision {
    /// Parse a CQL precision keyword, singular or plural.
    pub fn from_keyword(s: &str) -> Option<Self> {
        let s = s.trim_end_matches('s');
        Some(match s {
            "year" => Self::Year,
            "month" => Self::Month,
            "week" => Self::Week,
            "day" => Self::Day,
            "hour" => Self::Hour,
            "minute" => Self::Minute,
            "second" => Self::Second,
            "millisecond" => Self::Millisecond,
            _ => return None,
        })
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }
}

impl fmt::Display for TemporalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_keywords() {
        assert_eq!(TemporalPrecision::from_keyword("days"), Some(TemporalPrecision::Day));
        assert_eq!(TemporalPrecision::from_keyword("year"), Some(TemporalPrecision::Year));
        assert_eq!(TemporalPrecision::from_keyword("fortnight"), None);
    }

    #[test]
    fn test_null_tolerance() {
        assert!(BinaryOp::And.is_null_tolerant());
        assert!(BinaryOp::Equivalent.is_null_tolerant());
        assert!(!BinaryOp::Add.is_null_tolerant());
        assert!(UnaryOp::IsNull.is_null_tolerant());
        assert!(!UnaryOp::Negate.is_null_tolerant());
    }
}
