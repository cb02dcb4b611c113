//! Quantities and ratios with UCUM-aware unit conversion
//!
//! Calendar duration keywords (`year`, `months`, `days`) map onto their UCUM
//! codes for conversion; `a` and `mo` are read as calendar units when a
//! quantity is applied to a date.

use cqlpath_ast::TemporalPrecision;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of a unitless quantity
pub const UNITLESS: &str = "1";

/// Decimal places kept after a unit conversion
const CONVERSION_SCALE: u32 = 8;

/// CQL Quantity with value and unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlQuantity {
    pub value: Decimal,
    /// UCUM code or calendar keyword; `"1"` when unitless
    pub unit: String,
}

impl CqlQuantity {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        Self {
            value,
            unit: if unit.is_empty() {
                UNITLESS.to_string()
            } else {
                unit
            },
        }
    }

    pub fn unitless(value: Decimal) -> Self {
        Self::new(value, UNITLESS)
    }

    pub fn is_unitless(&self) -> bool {
        self.unit == UNITLESS
    }

    /// Duration unit, if this quantity is a time span
    pub fn temporal_unit(&self) -> Option<TemporalPrecision> {
        temporal_unit(&self.unit)
    }

    /// Whether both quantities measure the same dimension
    pub fn is_comparable_with(&self, other: &Self) -> bool {
        let (a, b) = (ucum_code(&self.unit), ucum_code(&other.unit));
        a == b || octofhir_ucum::is_comparable(a, b).unwrap_or(false)
    }

    /// Express this quantity in another unit. `None` when the units measure
    /// different dimensions or are not valid UCUM.
    pub fn convert_to(&self, unit: &str) -> Option<CqlQuantity> {
        if self.unit == unit {
            return Some(self.clone());
        }
        let (from, to) = (ucum_code(&self.unit), ucum_code(unit));
        if from == to {
            return Some(Self::new(self.value, unit));
        }
        if !octofhir_ucum::is_comparable(from, to).ok()? {
            return None;
        }
        let from_factor = octofhir_ucum::get_canonical_units(from).ok()?.factor;
        let to_factor = octofhir_ucum::get_canonical_units(to).ok()?.factor;
        if to_factor == 0.0 {
            return None;
        }
        let converted = self.value.to_f64()? * from_factor / to_factor;
        let value = Decimal::from_f64(converted)?
            .round_dp(CONVERSION_SCALE)
            .normalize();
        Some(Self::new(value, unit))
    }
}

impl fmt::Display for CqlQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unitless() {
            write!(f, "{}", self.value)
        } else if is_calendar_keyword(&self.unit) {
            write!(f, "{} {}", self.value, self.unit)
        } else {
            write!(f, "{} '{}'", self.value, self.unit)
        }
    }
}

/// CQL Ratio of two quantities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlRatio {
    pub numerator: CqlQuantity,
    pub denominator: CqlQuantity,
}

impl CqlRatio {
    pub fn new(numerator: CqlQuantity, denominator: CqlQuantity) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for CqlRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

fn is_calendar_keyword(unit: &str) -> bool {
    matches!(
        unit.trim_end_matches('s'),
        "year" | "month" | "week" | "day" | "hour" | "minute" | "second" | "millisecond"
    )
}

/// Duration unit named by a calendar keyword or UCUM time code
pub fn temporal_unit(unit: &str) -> Option<TemporalPrecision> {
    if is_calendar_keyword(unit) {
        return TemporalPrecision::from_keyword(unit);
    }
    Some(match unit {
        "a" => TemporalPrecision::Year,
        "mo" => TemporalPrecision::Month,
        "wk" => TemporalPrecision::Week,
        "d" => TemporalPrecision::Day,
        "h" => TemporalPrecision::Hour,
        "min" => TemporalPrecision::Minute,
        "s" => TemporalPrecision::Second,
        "ms" => TemporalPrecision::Millisecond,
        _ => return None,
    })
}

/// UCUM code for a unit, translating calendar keywords
pub fn ucum_code(unit: &str) -> &str {
    if !is_calendar_keyword(unit) {
        return unit;
    }
    match TemporalPrecision::from_keyword(unit) {
        Some(TemporalPrecision::Year) => "a",
        Some(TemporalPrecision::Month) => "mo",
        Some(TemporalPrecision::Week) => "wk",
        Some(TemporalPrecision::Day) => "d",
        Some(TemporalPrecision::Hour) => "h",
        Some(TemporalPrecision::Minute) => "min",
        Some(TemporalPrecision::Second) => "s",
        Some(TemporalPrecision::Millisecond) => "ms",
        None => unit,
    }
}
