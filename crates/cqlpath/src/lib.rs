//! Clinical Quality Language (CQL) and FHIRPath evaluation for Rust
//!
//! This crate bundles the cqlpath workspace behind one dependency:
//! - Expression trees and library shapes (`ast`)
//! - The runtime value model and coercion rules (`types`)
//! - The evaluation engine, query engine and data providers (`eval`)
//!
//! # Example
//!
//! ```rust
//! use cqlpath::{CqlEngine, CqlValue, EvaluationContext, Expression, Library};
//! use cqlpath::ast::BinaryOp;
//!
//! let library = Library::new("Example")
//!     .define("Threshold", Expression::integer(18))
//!     .define(
//!         "Adult",
//!         Expression::binary(
//!             BinaryOp::GreaterOrEqual,
//!             Expression::integer(42),
//!             Expression::identifier("Threshold"),
//!         ),
//!     );
//!
//! let engine = CqlEngine::new();
//! let mut ctx = EvaluationContext::new();
//! let adult = engine.evaluate_definition(&library, "Adult", &mut ctx).unwrap();
//! assert_eq!(adult, CqlValue::Boolean(true));
//! ```

// Re-export all public APIs from internal crates
pub use cqlpath_ast as ast;
pub use cqlpath_eval as eval;
pub use cqlpath_types as types;

// Convenience re-exports
pub use cqlpath_ast::{Expression, Library};
pub use cqlpath_eval::{
    CqlEngine, DataProvider, EngineConfig, EvalError, EvalResult, EvaluationContext,
    JsonDataProvider,
};
pub use cqlpath_types::{CqlType, CqlValue};
