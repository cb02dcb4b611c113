//! CQL value model
//!
//! This crate defines the runtime side of the CQL type system:
//! - `CqlValue` and its clinical and collection payloads
//! - partial-precision Date, DateTime and Time
//! - UCUM-aware quantities
//! - type descriptors and the implicit/explicit conversion rules

pub mod coercion;
mod quantity;
mod temporal;
mod type_system;
mod value;

pub use coercion::{
    CoercionError, CoercionResult, coerce, conversion_cost, converts_to, explicit_convert,
    promote, type_of,
};
pub use quantity::{CqlQuantity, CqlRatio, UNITLESS, temporal_unit, ucum_code};
pub use temporal::{
    CqlDate, CqlDateTime, CqlTime, DateTimePrecision, TemporalSpan, days_in_month, is_leap_year,
};
pub use type_system::{CqlType, TupleTypeElement};
pub use value::{
    CqlCode, CqlConcept, CqlInterval, CqlList, CqlTuple, CqlValue, max_decimal, min_decimal,
};
