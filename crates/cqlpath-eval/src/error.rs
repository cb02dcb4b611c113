//! Evaluation errors
//!
//! Only structural failures are errors. Missing data, null operands, empty
//! collections and arithmetic domain problems evaluate to `Null` instead.

use cqlpath_types::{CoercionError, CqlType};
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors raised while evaluating an expression
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// No implicit conversion unifies the operands
    #[error("Incompatible types: {left} and {right}")]
    IncompatibleType { left: String, right: String },

    /// No overload accepts the arguments, or more than one does equally well
    #[error("Could not resolve function {name}({signature})")]
    UnresolvedFunction { name: String, signature: String },

    /// A definition was re-entered while still being evaluated
    #[error("Circular definition: {cycle}")]
    CircularDefinition { cycle: String },

    /// Identifier not found in any scope, parameter, definition or focus
    #[error("Undefined reference: {name}")]
    UndefinedReference { name: String },

    /// Evaluation nested deeper than the configured limit
    #[error("Maximum evaluation depth of {depth} exceeded")]
    StackOverflow { depth: usize },

    /// Malformed input to a constructor or function
    #[error("Invalid argument to {operation}: {message}")]
    InvalidArgument { operation: String, message: String },

    /// `expand` would produce more points than allowed
    #[error("Expansion exceeds the limit of {limit} points")]
    ExpansionLimit { limit: usize },

    /// The data provider failed
    #[error("Data provider error: {message}")]
    DataProvider { message: String },

    /// Pattern given to `Matches`/`ReplaceMatches` does not compile
    #[error("Invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

impl EvalError {
    pub fn incompatible_type(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::IncompatibleType {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Incompatible-type error from two runtime types
    pub fn incompatible(left: &CqlType, right: &CqlType) -> Self {
        Self::incompatible_type(left.to_string(), right.to_string())
    }

    /// Unresolved call; `argument_types` is rendered as the attempted signature
    pub fn unresolved_function(name: impl Into<String>, argument_types: &[CqlType]) -> Self {
        Self::UnresolvedFunction {
            name: name.into(),
            signature: argument_types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Cycle error from the chain of definitions being evaluated
    pub fn circular_definition(chain: &[String]) -> Self {
        Self::CircularDefinition {
            cycle: chain.join(" -> "),
        }
    }

    pub fn undefined_reference(name: impl Into<String>) -> Self {
        Self::UndefinedReference { name: name.into() }
    }

    pub fn stack_overflow(depth: usize) -> Self {
        Self::StackOverflow { depth }
    }

    pub fn invalid_argument(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn expansion_limit(limit: usize) -> Self {
        Self::ExpansionLimit { limit }
    }

    pub fn data_provider(message: impl Into<String>) -> Self {
        Self::DataProvider {
            message: message.into(),
        }
    }

    pub fn invalid_regex(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Whether evaluation of the enclosing definition must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StackOverflow { .. } | Self::CircularDefinition { .. }
        )
    }
}

impl From<CoercionError> for EvalError {
    fn from(err: CoercionError) -> Self {
        match err {
            CoercionError::IncompatibleType { left, right } => {
                Self::IncompatibleType { left, right }
            }
            CoercionError::CannotConvert { from, to } => Self::IncompatibleType {
                left: from,
                right: to,
            },
        }
    }
}
