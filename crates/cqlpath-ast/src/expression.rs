//! Expression nodes
//!
//! One closed enum covers CQL and FHIRPath. FHIRPath method calls are
//! `Invocation` nodes; CQL function calls are `FunctionCall` nodes.

use crate::{
    BinaryOp, BoxExpr, DateLiteral, DateTimeLiteral, IntervalOp, Literal, OptBoxExpr,
    QuantityLiteral, Query, Retrieve, TemporalPrecision, TimeLiteral, TypeSpecifier, UnaryOp,
};
use rust_decimal::Decimal;

/// All expression kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // === Literals ===
    Literal(Literal),

    // === References ===
    /// Alias, let, operand, parameter, definition or (FHIRPath) property of
    /// the focus
    Identifier(String),
    /// `Library.Definition`
    QualifiedIdentifier { library: String, name: String },
    /// `source.path`
    Property { source: BoxExpr, path: String },

    // === Operators ===
    BinaryOp {
        op: BinaryOp,
        left: BoxExpr,
        right: BoxExpr,
    },
    UnaryOp { op: UnaryOp, operand: BoxExpr },
    /// Timing / interval relationship with optional precision
    IntervalOp {
        op: IntervalOp,
        precision: Option<TemporalPrecision>,
        left: BoxExpr,
        right: BoxExpr,
    },
    /// `x between low and high` (inclusive)
    Between {
        operand: BoxExpr,
        low: BoxExpr,
        high: BoxExpr,
    },

    // === Type operations ===
    Is {
        operand: BoxExpr,
        type_specifier: TypeSpecifier,
    },
    /// `as`; `strict` raises on mismatch instead of yielding null
    As {
        operand: BoxExpr,
        type_specifier: TypeSpecifier,
        strict: bool,
    },
    Convert {
        operand: BoxExpr,
        type_specifier: TypeSpecifier,
    },
    MinValue(TypeSpecifier),
    MaxValue(TypeSpecifier),

    // === Conditionals ===
    If {
        condition: BoxExpr,
        then_expr: BoxExpr,
        else_expr: BoxExpr,
    },
    /// Selected form when `comparand` is set, otherwise each `when` is a
    /// boolean condition
    Case {
        comparand: OptBoxExpr,
        items: Vec<CaseItem>,
        else_expr: BoxExpr,
    },
    Coalesce(Vec<Expression>),

    // === Constructors ===
    List(Vec<Expression>),
    Tuple(Vec<(String, Expression)>),
    /// Missing bound expressions mean unbounded
    Interval {
        low: OptBoxExpr,
        low_closed: bool,
        high: OptBoxExpr,
        high_closed: bool,
    },
    /// `Code '8480-6' from "LOINC" display '...'`; `system` names a declared
    /// codesystem or is a literal system URL
    Code {
        code: String,
        system: Option<String>,
        display: Option<String>,
    },
    /// `Concept { Code ..., Code ... } display '...'`
    Concept {
        codes: Vec<Expression>,
        display: Option<String>,
    },
    /// `source[index]`
    Indexer { source: BoxExpr, index: BoxExpr },

    // === Temporal ===
    /// `years between A and B`
    DurationBetween {
        precision: TemporalPrecision,
        low: BoxExpr,
        high: BoxExpr,
    },
    /// `difference in days between A and B`
    DifferenceBetween {
        precision: TemporalPrecision,
        low: BoxExpr,
        high: BoxExpr,
    },
    /// `year from X`
    DateTimeComponent {
        precision: TemporalPrecision,
        operand: BoxExpr,
    },
    Now,
    Today,
    TimeOfDay,
    /// `expand X per 2 days`
    Expand { operand: BoxExpr, per: OptBoxExpr },

    // === FHIRPath iteration variables ===
    This,
    Index,
    Total,

    // === Calls ===
    /// `Name(args)` or `Lib.Name(args)`
    FunctionCall {
        library: Option<String>,
        name: String,
        args: Vec<Expression>,
    },
    /// FHIRPath `source.name(args)`
    Invocation {
        source: BoxExpr,
        name: String,
        args: Vec<Expression>,
    },

    // === Queries ===
    Query(Box<Query>),
    Retrieve(Retrieve),
}

/// `when X then Y`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseItem {
    pub when: Expression,
    pub then: Expression,
}

impl CaseItem {
    pub fn new(when: Expression, then: Expression) -> Self {
        Self { when, then }
    }
}

// ============================================================================
// Builders
// ============================================================================

impl Expression {
    pub fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    pub fn boolean(b: bool) -> Self {
        Self::Literal(Literal::Boolean(b))
    }

    pub fn integer(i: i32) -> Self {
        Self::Literal(Literal::Integer(i))
    }

    pub fn long(i: i64) -> Self {
        Self::Literal(Literal::Long(i))
    }

    pub fn decimal(d: Decimal) -> Self {
        Self::Literal(Literal::Decimal(d))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Literal::String(s.into()))
    }

    pub fn quantity(value: Decimal, unit: impl Into<String>) -> Self {
        Self::Literal(Literal::Quantity(QuantityLiteral::new(value, unit)))
    }

    /// Date literal; trailing `None`s lower the precision
    pub fn date(year: i32, month: Option<u8>, day: Option<u8>) -> Self {
        Self::Literal(Literal::Date(DateLiteral { year, month, day }))
    }

    pub fn datetime(literal: DateTimeLiteral) -> Self {
        Self::Literal(Literal::DateTime(literal))
    }

    pub fn time(literal: TimeLiteral) -> Self {
        Self::Literal(Literal::Time(literal))
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(name.into())
    }

    pub fn qualified(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self::QualifiedIdentifier {
            library: library.into(),
            name: name.into(),
        }
    }

    pub fn property(source: Expression, path: impl Into<String>) -> Self {
        Self::Property {
            source: Box::new(source),
            path: path.into(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn timing(
        op: IntervalOp,
        precision: Option<TemporalPrecision>,
        left: Expression,
        right: Expression,
    ) -> Self {
        Self::IntervalOp {
            op,
            precision,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn list(elements: Vec<Expression>) -> Self {
        Self::List(elements)
    }

    pub fn tuple<S: Into<String>>(elements: impl IntoIterator<Item = (S, Expression)>) -> Self {
        Self::Tuple(elements.into_iter().map(|(n, e)| (n.into(), e)).collect())
    }

    pub fn interval(low: Expression, low_closed: bool, high: Expression, high_closed: bool) -> Self {
        Self::Interval {
            low: Some(Box::new(low)),
            low_closed,
            high: Some(Box::new(high)),
            high_closed,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::FunctionCall {
            library: None,
            name: name.into(),
            args,
        }
    }

    pub fn invoke(source: Expression, name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Invocation {
            source: Box::new(source),
            name: name.into(),
            args,
        }
    }

    pub fn if_then_else(condition: Expression, then_expr: Expression, else_expr: Expression) -> Self {
        Self::If {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    pub fn query(query: Query) -> Self {
        Self::Query(Box::new(query))
    }

    pub fn retrieve(data_type: impl Into<String>) -> Self {
        Self::Retrieve(Retrieve::new(data_type))
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}
