//! Literal AST nodes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// 32-bit signed
    Integer(i32),
    /// 64-bit signed, suffix `L`
    Long(i64),
    Decimal(Decimal),
    String(String),
    /// `@YYYY-MM-DD`, any prefix of it
    Date(DateLiteral),
    /// `@YYYY-MM-DDThh:mm:ss.fff(+|-)hh:mm`, any prefix of it
    DateTime(DateTimeLiteral),
    /// `@Thh:mm:ss.fff`
    Time(TimeLiteral),
    /// `5 'mg'`, `3 days`
    Quantity(QuantityLiteral),
    /// `1 'mg':2 'mL'`
    Ratio(RatioLiteral),
}

/// Date literal components. Missing trailing components set the declared
/// precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateLiteral {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl DateLiteral {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    pub fn with_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_day(mut self, day: u8) -> Self {
        self.day = Some(day);
        self
    }
}

/// DateTime literal components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeLiteral {
    pub date: DateLiteral,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
    /// Timezone offset in minutes east of UTC
    pub offset_minutes: Option<i32>,
}

impl DateTimeLiteral {
    pub fn new(date: DateLiteral) -> Self {
        Self {
            date,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
            offset_minutes: None,
        }
    }

    pub fn with_time(mut self, hour: u8, minute: Option<u8>, second: Option<u8>) -> Self {
        self.hour = Some(hour);
        self.minute = minute;
        self.second = second;
        self
    }

    pub fn with_millisecond(mut self, ms: u16) -> Self {
        self.millisecond = Some(ms);
        self
    }

    pub fn with_offset(mut self, minutes: i32) -> Self {
        self.offset_minutes = Some(minutes);
        self
    }
}

/// Time literal components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLiteral {
    pub hour: u8,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
}

impl TimeLiteral {
    pub fn new(hour: u8) -> Self {
        Self {
            hour,
            minute: None,
            second: None,
            millisecond: None,
        }
    }

    pub fn with_minute(mut self, minute: u8) -> Self {
        self.minute = Some(minute);
        self
    }

    pub fn with_second(mut self, second: u8) -> Self {
        self.second = Some(second);
        self
    }

    pub fn with_millisecond(mut self, ms: u16) -> Self {
        self.millisecond = Some(ms);
        self
    }
}

/// Quantity literal. `unit` holds the UCUM code or the calendar keyword as
/// written (`'mg'`, `days`); `None` is unitless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityLiteral {
    pub value: Decimal,
    pub unit: Option<String>,
}

impl QuantityLiteral {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
        }
    }

    pub fn unitless(value: Decimal) -> Self {
        Self { value, unit: None }
    }
}

/// Ratio literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioLiteral {
    pub numerator: QuantityLiteral,
    pub denominator: QuantityLiteral,
}
