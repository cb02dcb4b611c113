//! Expression tree shapes consumed by the cqlpath evaluator
//!
//! The grammar-driven parser lives outside this workspace; it hands the engine
//! trees built from the node types defined here. The same tree covers CQL
//! expressions and FHIRPath path navigation (`focus.where(...)`, `$this`).

mod expression;
mod library;
mod literal;
mod operator;
mod query;
mod types;

pub use expression::*;
pub use library::*;
pub use literal::*;
pub use operator::*;
pub use query::*;
pub use types::*;

/// Type alias for boxed expressions
pub type BoxExpr = Box<Expression>;

/// Type alias for optional boxed expressions
pub type OptBoxExpr = Option<Box<Expression>>;
