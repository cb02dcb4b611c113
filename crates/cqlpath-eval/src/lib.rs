//! CQL / FHIRPath Evaluation Engine
//!
//! This crate evaluates `cqlpath-ast` expression trees against in-memory
//! clinical data:
//!
//! - **Arithmetic Operators**: Add, Subtract, Multiply, Divide, Power, quantity math
//! - **Comparison Operators**: Equal, Equivalent, Less, Greater, with precision-aware temporals
//! - **Logical Operators**: And, Or, Not, Xor, Implies with three-valued logic
//! - **String Operators**: Concatenate, Split, Upper, Lower, Matches, etc.
//! - **DateTime Operators**: constructors, components, duration and difference
//! - **Interval Operators**: timing relations, Union, Intersect, Except, Collapse, Expand
//! - **List Operators**: First, Last, Flatten, Distinct, membership, etc.
//! - **Aggregate Functions**: Count, Sum, Avg, Min, Max, Median, StdDev, etc.
//! - **Query Evaluation**: Sources, Let, With/Without, Where, Return, Sort, Aggregate
//! - **Clinical Operators**: CalculateAge, code membership
//! - **FHIRPath Methods**: where, select, exists, all, repeat, ofType, iif, aggregate
//!
//! # Example
//!
//! ```rust
//! use cqlpath_ast::{BinaryOp, Expression};
//! use cqlpath_eval::{CqlEngine, EvaluationContext};
//! use cqlpath_types::CqlValue;
//!
//! let engine = CqlEngine::new();
//! let mut ctx = EvaluationContext::new();
//! let expr = Expression::binary(BinaryOp::Add, Expression::integer(1), Expression::integer(2));
//! assert_eq!(engine.evaluate(&expr, &mut ctx).unwrap(), CqlValue::Integer(3));
//! ```
//!
//! # Architecture
//!
//! - `CqlEngine`: immutable engine holding the function registry and limits
//! - `EvaluationContext`: per-run state (scopes, parameters, definition cache, provider)
//! - `operators`: value-level operator implementations
//! - `registry`: built-in functions with cost-ranked overload resolution
//! - `provider`: the data-source trait and an in-memory JSON provider
//!
//! # Three-Valued Logic
//!
//! - `And`: false dominates (null and false = false)
//! - `Or`: true dominates (null or true = true)
//! - Comparisons return null when operands have insufficient precision

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
mod library;
pub mod operators;
pub mod provider;
mod query;
pub mod registry;

// Re-export main types
pub use config::EngineConfig;
pub use context::{EvaluationContext, EvaluationContextBuilder, Scope};
pub use engine::CqlEngine;
pub use error::{EvalError, EvalResult};
pub use provider::{
    DataProvider, JsonDataProvider, RetrieveRequest, extract_codes, json_to_cql, navigate_value,
};
pub use registry::{FunctionImpl, FunctionRegistry, FunctionSignature, NullMode, Overload};

// Re-export commonly used operator helpers
pub use operators::comparison::{compare, equal, equivalent};
pub use operators::{apply_binary, apply_unary};
