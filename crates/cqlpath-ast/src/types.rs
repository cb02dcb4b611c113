//! Type specifier nodes (`is`, `as`, `convert`, operand declarations)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSpecifier {
    /// Named type (`Integer`, `System.String`, `FHIR.Patient`)
    Named {
        namespace: Option<String>,
        name: String,
    },
    /// `List<T>`
    List(Box<TypeSpecifier>),
    /// `Interval<T>`
    Interval(Box<TypeSpecifier>),
    /// `Tuple { name String, age Integer }`
    Tuple(Vec<(String, TypeSpecifier)>),
    /// `Choice<Integer, String>`
    Choice(Vec<TypeSpecifier>),
}

impl TypeSpecifier {
    /// Create a named type specifier. A dotted name is split into
    /// namespace and name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.split_once('.') {
            Some((ns, local)) => Self::Named {
                namespace: Some(ns.to_string()),
                name: local.to_string(),
            },
            None => Self::Named {
                namespace: None,
                name,
            },
        }
    }

    pub fn list(element_type: TypeSpecifier) -> Self {
        Self::List(Box::new(element_type))
    }

    pub fn interval(point_type: TypeSpecifier) -> Self {
        Self::Interval(Box::new(point_type))
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named {
                namespace: Some(ns),
                name,
            } => write!(f, "{ns}.{name}"),
            Self::Named { name, .. } => f.write_str(name),
            Self::List(t) => write!(f, "List<{t}>"),
            Self::Interval(t) => write!(f, "Interval<{t}>"),
            Self::Tuple(elements) => {
                f.write_str("Tuple { ")?;
                for (i, (n, t)) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{n} {t}")?;
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
        }
    }
}
