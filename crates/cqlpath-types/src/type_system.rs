//! CQL Type System
//!
//! Runtime type descriptors: primitives, collection shapes, tuples, choices
//! and named model types. Used by overload resolution, `is`/`as` and list
//! element inference.

use cqlpath_ast::TypeSpecifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A CQL type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CqlType {
    /// Supertype of all types; also the type of `null`
    Any,

    Boolean,
    Integer,
    Long,
    Decimal,
    String,

    Date,
    DateTime,
    Time,

    Quantity,
    Ratio,
    Code,
    Concept,

    #[serde(rename = "List")]
    List(Box<CqlType>),
    #[serde(rename = "Interval")]
    Interval(Box<CqlType>),
    #[serde(rename = "Tuple")]
    Tuple(Vec<TupleTypeElement>),
    #[serde(rename = "Choice")]
    Choice(Vec<CqlType>),

    /// Model type (`FHIR.Patient`)
    #[serde(rename = "NamedType")]
    Named {
        namespace: Option<String>,
        name: String,
    },
}

/// Named element of a tuple type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleTypeElement {
    pub name: String,
    pub element_type: CqlType,
}

impl TupleTypeElement {
    pub fn new(name: impl Into<String>, element_type: CqlType) -> Self {
        Self {
            name: name.into(),
            element_type,
        }
    }
}

impl CqlType {
    pub fn list(element_type: CqlType) -> Self {
        Self::List(Box::new(element_type))
    }

    pub fn interval(point_type: CqlType) -> Self {
        Self::Interval(Box::new(point_type))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            namespace: None,
            name: name.into(),
        }
    }

    /// Resolve a system type name (`Integer`, `System.Integer`). Unknown
    /// names become model types.
    pub fn from_name(namespace: Option<&str>, name: &str) -> Self {
        if matches!(namespace, None | Some("System")) {
            let system = match name {
                "Any" => Some(Self::Any),
                "Boolean" => Some(Self::Boolean),
                "Integer" => Some(Self::Integer),
                "Long" => Some(Self::Long),
                "Decimal" => Some(Self::Decimal),
                "String" => Some(Self::String),
                "Date" => Some(Self::Date),
                "DateTime" => Some(Self::DateTime),
                "Time" => Some(Self::Time),
                "Quantity" => Some(Self::Quantity),
                "Ratio" => Some(Self::Ratio),
                "Code" => Some(Self::Code),
                "Concept" => Some(Self::Concept),
                _ => None,
            };
            if let Some(t) = system {
                return t;
            }
        }
        Self::Named {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Lower a parse-tree type specifier
    pub fn from_specifier(spec: &TypeSpecifier) -> Self {
        match spec {
            TypeSpecifier::Named { namespace, name } => Self::from_name(namespace.as_deref(), name),
            TypeSpecifier::List(t) => Self::list(Self::from_specifier(t)),
            TypeSpecifier::Interval(t) => Self::interval(Self::from_specifier(t)),
            TypeSpecifier::Tuple(elements) => Self::Tuple(
                elements
                    .iter()
                    .map(|(n, t)| TupleTypeElement::new(n.clone(), Self::from_specifier(t)))
                    .collect(),
            ),
            TypeSpecifier::Choice(types) => {
                Self::Choice(types.iter().map(Self::from_specifier).collect())
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Decimal)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Time)
    }

    /// Types with a total order usable as interval points
    pub fn is_ordered(&self) -> bool {
        self.is_numeric() || self.is_temporal() || matches!(self, Self::Quantity | Self::String)
    }

    pub fn element_type(&self) -> Option<&CqlType> {
        match self {
            Self::List(t) => Some(t),
            _ => None,
        }
    }

    pub fn point_type(&self) -> Option<&CqlType> {
        match self {
            Self::Interval(t) => Some(t),
            _ => None,
        }
    }

    /// Subtype check without implicit conversions
    pub fn is_subtype_of(&self, other: &CqlType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (_, Self::Any) => true,
            (_, Self::Choice(types)) => types.iter().any(|t| self.is_subtype_of(t)),
            (Self::Choice(types), _) => types.iter().all(|t| t.is_subtype_of(other)),
            (Self::List(a), Self::List(b)) | (Self::Interval(a), Self::Interval(b)) => {
                a.is_subtype_of(b)
            }
            (Self::Tuple(a), Self::Tuple(b)) => b.iter().all(|eb| {
                a.iter()
                    .find(|ea| ea.name == eb.name)
                    .is_some_and(|ea| ea.element_type.is_subtype_of(&eb.element_type))
            }),
            (
                Self::Named { name: a, .. },
                Self::Named {
                    namespace: None,
                    name: b,
                },
            ) => a == b,
            _ => false,
        }
    }

    /// Least common supertype, widening numerics along the implicit ladder
    pub fn common_supertype(&self, other: &CqlType) -> CqlType {
        if self.is_subtype_of(other) {
            return other.clone();
        }
        if other.is_subtype_of(self) {
            return self.clone();
        }
        match (self, other) {
            (Self::Integer, Self::Long) | (Self::Long, Self::Integer) => Self::Long,
            (a, b) if a.is_numeric() && b.is_numeric() => Self::Decimal,
            (Self::List(a), Self::List(b)) => Self::list(a.common_supertype(b)),
            (Self::Interval(a), Self::Interval(b)) => Self::interval(a.common_supertype(b)),
            _ => Self::Any,
        }
    }
}

impl Default for CqlType {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Boolean => f.write_str("Boolean"),
            Self::Integer => f.write_str("Integer"),
            Self::Long => f.write_str("Long"),
            Self::Decimal => f.write_str("Decimal"),
            Self::String => f.write_str("String"),
            Self::Date => f.write_str("Date"),
            Self::DateTime => f.write_str("DateTime"),
            Self::Time => f.write_str("Time"),
            Self::Quantity => f.write_str("Quantity"),
            Self::Ratio => f.write_str("Ratio"),
            Self::Code => f.write_str("Code"),
            Self::Concept => f.write_str("Concept"),
            Self::List(t) => write!(f, "List<{t}>"),
            Self::Interval(t) => write!(f, "Interval<{t}>"),
            Self::Tuple(elements) => {
                f.write_str("Tuple { ")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", e.name, e.element_type)?;
                }
                f.write_str(" }")
            }
            Self::Choice(types) => {
                f.write_str("Choice<")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{t}")?;
                }
                f.write_str(">")
            }
            Self::Named {
                namespace: Some(ns),
                name,
            } => write!(f, "{ns}.{name}"),
            Self::Named { name, .. } => f.write_str(name),
        }
    }
}
