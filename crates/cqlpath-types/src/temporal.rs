//! Partial-precision temporal values
//!
//! `CqlDate`, `CqlDateTime` and `CqlTime` carry their components as options;
//! the finest present component is the value's precision. All comparison and
//! arithmetic consults precision first:
//! - comparison walks components from year down; a component present on one
//!   side only (after equal coarser components) makes the result uncertain
//! - seconds and milliseconds count as a single precision
//! - calendar arithmetic clamps the day to the end of the resulting month
//! - durations finer than the value's precision are truncated to it
//!
//! Date and Time share the DateTime machinery: a Date is a DateTime without
//! time components, a Time is a DateTime pinned to 1970-01-01.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use cqlpath_ast::TemporalPrecision;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Precision of a temporal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DateTimePrecision {
    pub const ALL: [DateTimePrecision; 7] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
        Self::Millisecond,
    ];

    /// Map a precision keyword; `week` has no component of its own
    pub fn from_unit(unit: TemporalPrecision) -> Option<Self> {
        Some(match unit {
            TemporalPrecision::Year => Self::Year,
            TemporalPrecision::Month => Self::Month,
            TemporalPrecision::Week => return None,
            TemporalPrecision::Day => Self::Day,
            TemporalPrecision::Hour => Self::Hour,
            TemporalPrecision::Minute => Self::Minute,
            TemporalPrecision::Second => Self::Second,
            TemporalPrecision::Millisecond => Self::Millisecond,
        })
    }

    pub fn unit(self) -> TemporalPrecision {
        match self {
            Self::Year => TemporalPrecision::Year,
            Self::Month => TemporalPrecision::Month,
            Self::Day => TemporalPrecision::Day,
            Self::Hour => TemporalPrecision::Hour,
            Self::Minute => TemporalPrecision::Minute,
            Self::Second => TemporalPrecision::Second,
            Self::Millisecond => TemporalPrecision::Millisecond,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Milliseconds in one unit, for definite precisions
    fn millis(self) -> Option<i64> {
        match self {
            Self::Year | Self::Month => None,
            Self::Day => Some(86_400_000),
            Self::Hour => Some(3_600_000),
            Self::Minute => Some(60_000),
            Self::Second => Some(1_000),
            Self::Millisecond => Some(1),
        }
    }
}

impl fmt::Display for DateTimePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit().keyword())
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// Whole-unit result of `duration`/`difference` between two values. When an
/// operand is coarser than the requested unit the result is a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalSpan {
    pub low: i64,
    pub high: i64,
}

impl TemporalSpan {
    pub fn exact(value: i64) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.low == self.high
    }
}

// ============================================================================
// DateTime
// ============================================================================

/// CQL DateTime with precision and optional timezone offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlDateTime {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
    /// Offset in minutes east of UTC
    pub timezone_offset: Option<i16>,
}

impl CqlDateTime {
    /// Full-precision datetime without offset
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        millisecond: u16,
    ) -> Self {
        Self::from_parts(
            &[
                year,
                i32::from(month),
                i32::from(day),
                i32::from(hour),
                i32::from(minute),
                i32::from(second),
                i32::from(millisecond),
            ],
            None,
        )
    }

    /// Build from leading components (year first). The number of parts sets
    /// the precision.
    pub fn from_parts(parts: &[i32], timezone_offset: Option<i16>) -> Self {
        let get = |i: usize| parts.get(i).copied();
        let narrow = |i: usize| get(i).and_then(|v| u8::try_from(v).ok());
        Self {
            year: get(0).unwrap_or(1),
            month: narrow(1),
            day: narrow(2),
            hour: narrow(3),
            minute: narrow(4),
            second: narrow(5),
            millisecond: get(6).and_then(|v| u16::try_from(v).ok()),
            timezone_offset,
        }
    }

    pub fn with_offset(mut self, minutes: i16) -> Self {
        self.timezone_offset = Some(minutes);
        self
    }

    /// Components from year to millisecond
    pub fn parts(&self) -> [Option<i32>; 7] {
        [
            Some(self.year),
            self.month.map(i32::from),
            self.day.map(i32::from),
            self.hour.map(i32::from),
            self.minute.map(i32::from),
            self.second.map(i32::from),
            self.millisecond.map(i32::from),
        ]
    }

    pub fn component(&self, precision: DateTimePrecision) -> Option<i32> {
        self.parts()[precision.index()]
    }

    /// Finest present component
    pub fn precision(&self) -> DateTimePrecision {
        let parts = self.parts();
        let mut precision = DateTimePrecision::Year;
        for p in &DateTimePrecision::ALL[1..] {
            if parts[p.index()].is_none() {
                break;
            }
            precision = *p;
        }
        precision
    }

    /// Components are contiguous and within calendar ranges
    pub fn is_valid(&self) -> bool {
        let parts = self.parts();
        let present = parts.iter().take_while(|p| p.is_some()).count();
        if parts[present..].iter().any(Option::is_some) {
            return false;
        }
        if !(1..=9999).contains(&self.year) {
            return false;
        }
        if let Some(m) = self.month {
            if !(1..=12).contains(&m) {
                return false;
            }
            if let Some(d) = self.day {
                if d < 1 || d > days_in_month(self.year, m) {
                    return false;
                }
            }
        }
        let tz_ok = self
            .timezone_offset
            .is_none_or(|o| (-14 * 60..=14 * 60).contains(&o));
        tz_ok
            && self.hour.is_none_or(|h| h < 24)
            && self.minute.is_none_or(|m| m < 60)
            && self.second.is_none_or(|s| s < 60)
            && self.millisecond.is_none_or(|ms| ms < 1000)
    }

    /// Drop components finer than `precision`
    pub fn truncate(&self, precision: DateTimePrecision) -> Self {
        let mut result = self.clone();
        let keep = precision.index();
        if keep < 1 {
            result.month = None;
        }
        if keep < 2 {
            result.day = None;
        }
        if keep < 3 {
            result.hour = None;
        }
        if keep < 4 {
            result.minute = None;
        }
        if keep < 5 {
            result.second = None;
        }
        if keep < 6 {
            result.millisecond = None;
        }
        result
    }

    /// Earliest instant covered by this value
    pub fn low_boundary(&self) -> Self {
        Self {
            year: self.year,
            month: Some(self.month.unwrap_or(1)),
            day: Some(self.day.unwrap_or(1)),
            hour: Some(self.hour.unwrap_or(0)),
            minute: Some(self.minute.unwrap_or(0)),
            second: Some(self.second.unwrap_or(0)),
            millisecond: Some(self.millisecond.unwrap_or(0)),
            timezone_offset: self.timezone_offset,
        }
    }

    /// Latest instant covered by this value
    pub fn high_boundary(&self) -> Self {
        let month = self.month.unwrap_or(12);
        Self {
            year: self.year,
            month: Some(month),
            day: Some(self.day.unwrap_or_else(|| days_in_month(self.year, month))),
            hour: Some(self.hour.unwrap_or(23)),
            minute: Some(self.minute.unwrap_or(59)),
            second: Some(self.second.unwrap_or(59)),
            millisecond: Some(self.millisecond.unwrap_or(999)),
            timezone_offset: self.timezone_offset,
        }
    }

    /// Missing components filled with their minimum
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let low = self.low_boundary();
        NaiveDate::from_ymd_opt(
            low.year,
            u32::from(low.month.unwrap_or(1)),
            u32::from(low.day.unwrap_or(1)),
        )?
        .and_hms_milli_opt(
            u32::from(low.hour.unwrap_or(0)),
            u32::from(low.minute.unwrap_or(0)),
            u32::from(low.second.unwrap_or(0)),
            u32::from(low.millisecond.unwrap_or(0)),
        )
    }

    pub fn from_naive(
        value: NaiveDateTime,
        precision: DateTimePrecision,
        timezone_offset: Option<i16>,
    ) -> Self {
        let full = Self {
            year: value.year(),
            month: u8::try_from(value.month()).ok(),
            day: u8::try_from(value.day()).ok(),
            hour: u8::try_from(value.hour()).ok(),
            minute: u8::try_from(value.minute()).ok(),
            second: u8::try_from(value.second()).ok(),
            millisecond: u16::try_from(value.nanosecond() / 1_000_000).ok(),
            timezone_offset,
        };
        full.truncate(precision)
    }

    /// Millisecond-precision value from a clock reading
    pub fn from_chrono(value: &chrono::DateTime<FixedOffset>) -> Self {
        let offset = i16::try_from(value.offset().local_minus_utc() / 60).ok();
        Self::from_naive(value.naive_local(), DateTimePrecision::Millisecond, offset)
    }

    /// Shift to another offset. Values coarser than an hour are left alone.
    pub fn normalized(&self, offset: i16) -> Self {
        match self.timezone_offset {
            Some(current) if current != offset && self.precision() >= DateTimePrecision::Hour => {
                let shift = TimeDelta::try_minutes(i64::from(offset) - i64::from(current));
                match (self.to_naive(), shift) {
                    (Some(naive), Some(shift)) => match naive.checked_add_signed(shift) {
                        Some(shifted) => Self::from_naive(shifted, self.precision(), Some(offset)),
                        None => self.clone(),
                    },
                    _ => self.clone(),
                }
            }
            _ => self.clone(),
        }
    }

    /// Bring two values onto a common offset when both carry differing ones
    fn aligned(&self, other: &Self) -> (Self, Self) {
        match (self.timezone_offset, other.timezone_offset) {
            (Some(a), Some(b)) if a != b => (self.normalized(0), other.normalized(0)),
            _ => (self.clone(), other.clone()),
        }
    }

    /// Three-valued comparison; `None` when the answer depends on components
    /// present on one side only
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let (a, b) = self.aligned(other);
        compare_parts(&a.parts(), &b.parts(), DateTimePrecision::Millisecond, false)
    }

    /// Comparison at a given precision (`same day as`, `before month of`).
    /// `None` when either value lacks a component up to that precision and
    /// no coarser component already decides.
    pub fn compare_at(&self, other: &Self, precision: DateTimePrecision) -> Option<Ordering> {
        let (a, b) = self.aligned(other);
        compare_parts(&a.parts(), &b.parts(), precision, true)
    }

    pub fn date(&self) -> CqlDate {
        CqlDate {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }

    pub fn time(&self) -> Option<CqlTime> {
        Some(CqlTime {
            hour: self.hour?,
            minute: self.minute,
            second: self.second,
            millisecond: self.millisecond,
        })
    }

    /// Add a duration; `None` when the result leaves years 1..9999
    pub fn add(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        let (amount, unit) = match unit {
            TemporalPrecision::Week => (amount.checked_mul(7)?, DateTimePrecision::Day),
            other => (amount, DateTimePrecision::from_unit(other)?),
        };
        let precision = self.precision();
        let (amount, unit) = if unit > precision {
            (convert_down(amount, unit, precision)?, precision)
        } else {
            (amount, unit)
        };

        let result = match unit {
            DateTimePrecision::Year => self.add_months(amount.checked_mul(12)?)?,
            DateTimePrecision::Month => self.add_months(amount)?,
            definite => {
                let millis = amount.checked_mul(definite.millis()?)?;
                let shifted = self
                    .to_naive()?
                    .checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
                Self::from_naive(shifted, precision, self.timezone_offset)
            }
        };
        (1..=9999).contains(&result.year).then_some(result)
    }

    pub fn subtract(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        self.add(amount.checked_neg()?, unit)
    }

    fn add_months(&self, months: i64) -> Option<Self> {
        let current = i64::from(self.year) * 12 + i64::from(self.month.unwrap_or(1)) - 1;
        let total = current.checked_add(months)?;
        let year = i32::try_from(total.div_euclid(12)).ok()?;
        let month = u8::try_from(total.rem_euclid(12) + 1).ok()?;
        let mut result = self.clone();
        result.year = year;
        if self.month.is_some() {
            result.month = Some(month);
        }
        if let Some(day) = self.day {
            result.day = Some(day.min(days_in_month(year, month)));
        }
        Some(result)
    }

    /// Next value at this value's precision
    pub fn successor(&self) -> Option<Self> {
        self.add(1, self.precision().unit())
    }

    pub fn predecessor(&self) -> Option<Self> {
        self.add(-1, self.precision().unit())
    }

    /// Whole calendar periods from `self` to `other` (`years between`)
    pub fn duration_between(&self, other: &Self, unit: TemporalPrecision) -> Option<TemporalSpan> {
        self.span(other, unit, whole_periods)
    }

    /// Boundaries crossed from `self` to `other` (`difference in days`)
    pub fn difference_between(
        &self,
        other: &Self,
        unit: TemporalPrecision,
    ) -> Option<TemporalSpan> {
        self.span(other, unit, boundaries_crossed)
    }

    fn span(
        &self,
        other: &Self,
        unit: TemporalPrecision,
        measure: fn(NaiveDateTime, NaiveDateTime, TemporalPrecision) -> Option<i64>,
    ) -> Option<TemporalSpan> {
        let (a, b) = self.aligned(other);
        let needed = DateTimePrecision::from_unit(unit).unwrap_or(DateTimePrecision::Day);
        let precision = a.precision();
        if precision == b.precision() && precision >= needed {
            return Some(TemporalSpan::exact(measure(a.to_naive()?, b.to_naive()?, unit)?));
        }
        // mixed or coarse precision: measure across the boundary values
        let shortest = measure(
            a.high_boundary().to_naive()?,
            b.low_boundary().to_naive()?,
            unit,
        )?;
        let longest = measure(
            a.low_boundary().to_naive()?,
            b.high_boundary().to_naive()?,
            unit,
        )?;
        Some(TemporalSpan {
            low: shortest.min(longest),
            high: shortest.max(longest),
        })
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let (date_part, time_part) = match s.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (s, None),
        };
        let date = CqlDate::parse(date_part)?;
        let mut result = Self {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
            timezone_offset: None,
        };
        if let Some(time_part) = time_part.filter(|t| !t.is_empty()) {
            let (clock, offset) = split_offset(time_part)?;
            if !clock.is_empty() {
                if result.day.is_none() {
                    return None;
                }
                let time = CqlTime::parse(clock)?;
                result.hour = Some(time.hour);
                result.minute = time.minute;
                result.second = time.second;
                result.millisecond = time.millisecond;
            }
            result.timezone_offset = offset;
        }
        result.is_valid().then_some(result)
    }
}

impl fmt::Display for CqlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T", self.date())?;
        if let Some(time) = self.time() {
            write!(f, "{time}")?;
            match self.timezone_offset {
                Some(0) => f.write_str("Z")?,
                Some(offset) => {
                    let sign = if offset < 0 { '-' } else { '+' };
                    let abs = offset.unsigned_abs();
                    write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)?;
                }
                None => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// Date
// ============================================================================

/// CQL Date with year, month or day precision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl CqlDate {
    pub fn new(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: Some(day),
        }
    }

    pub fn year_only(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    pub fn year_month(year: i32, month: u8) -> Self {
        Self {
            year,
            month: Some(month),
            day: None,
        }
    }

    pub fn precision(&self) -> DateTimePrecision {
        self.to_datetime().precision()
    }

    pub fn is_valid(&self) -> bool {
        self.to_datetime().is_valid()
    }

    pub fn to_datetime(&self) -> CqlDateTime {
        CqlDateTime {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: None,
            minute: None,
            second: None,
            millisecond: None,
            timezone_offset: None,
        }
    }

    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, u32::from(self.month?), u32::from(self.day?))
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        self.to_datetime().compare(&other.to_datetime())
    }

    pub fn compare_at(&self, other: &Self, precision: DateTimePrecision) -> Option<Ordering> {
        self.to_datetime()
            .compare_at(&other.to_datetime(), precision.min(DateTimePrecision::Day))
    }

    pub fn truncate(&self, precision: DateTimePrecision) -> Self {
        self.to_datetime().truncate(precision).date()
    }

    pub fn add(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        self.to_datetime().add(amount, unit).map(|dt| dt.date())
    }

    pub fn subtract(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        self.to_datetime().subtract(amount, unit).map(|dt| dt.date())
    }

    pub fn successor(&self) -> Option<Self> {
        self.to_datetime().successor().map(|dt| dt.date())
    }

    pub fn predecessor(&self) -> Option<Self> {
        self.to_datetime().predecessor().map(|dt| dt.date())
    }

    pub fn duration_between(&self, other: &Self, unit: TemporalPrecision) -> Option<TemporalSpan> {
        self.to_datetime()
            .duration_between(&other.to_datetime(), unit)
    }

    pub fn difference_between(
        &self,
        other: &Self,
        unit: TemporalPrecision,
    ) -> Option<TemporalSpan> {
        self.to_datetime()
            .difference_between(&other.to_datetime(), unit)
    }

    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, optional `@` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let mut parts = s.split('-');
        let year_str = parts.next()?;
        if year_str.len() != 4 {
            return None;
        }
        let year = year_str.parse().ok()?;
        let month = match parts.next() {
            Some(part) => Some(parse_two_digits(part)?),
            None => None,
        };
        let day = match parts.next() {
            Some(part) => Some(parse_two_digits(part)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        let date = Self { year, month, day };
        date.is_valid().then_some(date)
    }
}

impl fmt::Display for CqlDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
            if let Some(day) = self.day {
                write!(f, "-{day:02}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Time
// ============================================================================

/// CQL Time with hour through millisecond precision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CqlTime {
    pub hour: u8,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub millisecond: Option<u16>,
}

impl CqlTime {
    pub fn new(hour: u8, minute: u8, second: u8, millisecond: u16) -> Self {
        Self {
            hour,
            minute: Some(minute),
            second: Some(second),
            millisecond: Some(millisecond),
        }
    }

    pub fn hour_only(hour: u8) -> Self {
        Self {
            hour,
            minute: None,
            second: None,
            millisecond: None,
        }
    }

    pub fn hour_minute(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute: Some(minute),
            second: None,
            millisecond: None,
        }
    }

    pub fn precision(&self) -> DateTimePrecision {
        self.to_datetime().precision()
    }

    pub fn is_valid(&self) -> bool {
        self.to_datetime().is_valid()
    }

    /// Pin to 1970-01-01 so the datetime machinery applies
    pub fn to_datetime(&self) -> CqlDateTime {
        CqlDateTime {
            year: 1970,
            month: Some(1),
            day: Some(1),
            hour: Some(self.hour),
            minute: self.minute,
            second: self.second,
            millisecond: self.millisecond,
            timezone_offset: None,
        }
    }

    fn from_datetime(value: &CqlDateTime) -> Option<Self> {
        value.time()
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        self.to_datetime().compare(&other.to_datetime())
    }

    pub fn compare_at(&self, other: &Self, precision: DateTimePrecision) -> Option<Ordering> {
        self.to_datetime()
            .compare_at(&other.to_datetime(), precision.max(DateTimePrecision::Hour))
    }

    pub fn truncate(&self, precision: DateTimePrecision) -> Self {
        let truncated = self
            .to_datetime()
            .truncate(precision.max(DateTimePrecision::Hour));
        Self::from_datetime(&truncated).unwrap_or_else(|| self.clone())
    }

    /// Clock arithmetic wraps around midnight; calendar units do not apply
    pub fn add(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        if matches!(unit, TemporalPrecision::Year | TemporalPrecision::Month) {
            return None;
        }
        let dt = self.to_datetime();
        let (amount, unit) = match DateTimePrecision::from_unit(unit) {
            Some(p) if p > self.precision() => (
                convert_down(amount, p, self.precision())?,
                self.precision().unit(),
            ),
            _ => (amount, unit),
        };
        let millis = match unit {
            TemporalPrecision::Week => amount.checked_mul(7 * 86_400_000)?,
            other => amount.checked_mul(DateTimePrecision::from_unit(other)?.millis()?)?,
        };
        let millis = millis.rem_euclid(86_400_000);
        let shifted = dt
            .to_naive()?
            .checked_add_signed(TimeDelta::try_milliseconds(millis)?)?;
        Self::from_datetime(&CqlDateTime::from_naive(shifted, dt.precision(), None))
    }

    pub fn subtract(&self, amount: i64, unit: TemporalPrecision) -> Option<Self> {
        self.add(amount.checked_neg()?, unit)
    }

    /// `None` past the ends of the day
    pub fn successor(&self) -> Option<Self> {
        let next = self.to_datetime().successor()?;
        (next.day == Some(1)).then(|| Self::from_datetime(&next)).flatten()
    }

    pub fn predecessor(&self) -> Option<Self> {
        let prev = self.to_datetime().predecessor()?;
        (prev.day == Some(1)).then(|| Self::from_datetime(&prev)).flatten()
    }

    pub fn duration_between(&self, other: &Self, unit: TemporalPrecision) -> Option<TemporalSpan> {
        self.to_datetime()
            .duration_between(&other.to_datetime(), unit)
    }

    pub fn difference_between(
        &self,
        other: &Self,
        unit: TemporalPrecision,
    ) -> Option<TemporalSpan> {
        self.to_datetime()
            .difference_between(&other.to_datetime(), unit)
    }

    pub fn to_milliseconds(&self) -> u32 {
        (u32::from(self.hour) * 3600
            + u32::from(self.minute.unwrap_or(0)) * 60
            + u32::from(self.second.unwrap_or(0)))
            * 1000
            + u32::from(self.millisecond.unwrap_or(0))
    }

    /// `hh[:mm[:ss[.fff]]]`, optional `@T`/`T` prefix
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let s = s.strip_prefix('T').unwrap_or(s);
        let (clock, fraction) = match s.split_once('.') {
            Some((c, f)) => (c, Some(f)),
            None => (s, None),
        };
        let mut parts = clock.split(':');
        let hour = parse_two_digits(parts.next()?)?;
        let minute = match parts.next() {
            Some(part) => Some(parse_two_digits(part)?),
            None => None,
        };
        let second = match parts.next() {
            Some(part) => Some(parse_two_digits(part)?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        let millisecond = match fraction {
            Some(f) if second.is_some() => Some(parse_fraction(f)?),
            Some(_) => return None,
            None => None,
        };
        let time = Self {
            hour,
            minute,
            second,
            millisecond,
        };
        time.is_valid().then_some(time)
    }
}

impl fmt::Display for CqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.hour)?;
        if let Some(minute) = self.minute {
            write!(f, ":{minute:02}")?;
            if let Some(second) = self.second {
                write!(f, ":{second:02}")?;
                if let Some(ms) = self.millisecond {
                    write!(f, ".{ms:03}")?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn compare_parts(
    a: &[Option<i32>; 7],
    b: &[Option<i32>; 7],
    up_to: DateTimePrecision,
    require_precision: bool,
) -> Option<Ordering> {
    let ms = DateTimePrecision::Millisecond.index();
    for i in 0..=up_to.index() {
        match (a[i], b[i]) {
            (Some(x), Some(y)) => {
                if x != y {
                    return Some(x.cmp(&y));
                }
            }
            // seconds and milliseconds are one precision
            (x, y) if i == ms && a[ms - 1].is_some() && b[ms - 1].is_some() => {
                let ordering = x.unwrap_or(0).cmp(&y.unwrap_or(0));
                if ordering != Ordering::Equal {
                    return Some(ordering);
                }
            }
            (None, None) if !require_precision => return Some(Ordering::Equal),
            _ => return None,
        }
    }
    Some(Ordering::Equal)
}

/// Convert an amount of a fine unit into a coarser one, truncating
fn convert_down(amount: i64, from: DateTimePrecision, to: DateTimePrecision) -> Option<i64> {
    if from == DateTimePrecision::Month {
        return Some(amount / 12);
    }
    let millis = amount.checked_mul(from.millis()?)?;
    match to {
        DateTimePrecision::Year => Some(millis / 86_400_000 / 365),
        DateTimePrecision::Month => Some(millis / 86_400_000 / 30),
        definite => Some(millis / definite.millis()?),
    }
}

fn whole_periods(a: NaiveDateTime, b: NaiveDateTime, unit: TemporalPrecision) -> Option<i64> {
    match unit {
        TemporalPrecision::Year | TemporalPrecision::Month => {
            let mut months = (i64::from(b.year()) - i64::from(a.year())) * 12
                + i64::from(b.month())
                - i64::from(a.month());
            let rest_a = (a.day(), a.time());
            let rest_b = (b.day(), b.time());
            if months > 0 && rest_b < rest_a {
                months -= 1;
            } else if months < 0 && rest_b > rest_a {
                months += 1;
            }
            Some(if unit == TemporalPrecision::Year {
                months / 12
            } else {
                months
            })
        }
        TemporalPrecision::Week => Some((b - a).num_milliseconds() / (7 * 86_400_000)),
        definite => {
            let step = DateTimePrecision::from_unit(definite)?.millis()?;
            Some((b - a).num_milliseconds() / step)
        }
    }
}

fn boundaries_crossed(a: NaiveDateTime, b: NaiveDateTime, unit: TemporalPrecision) -> Option<i64> {
    match unit {
        TemporalPrecision::Year => Some(i64::from(b.year()) - i64::from(a.year())),
        TemporalPrecision::Month => Some(
            (i64::from(b.year()) - i64::from(a.year())) * 12 + i64::from(b.month())
                - i64::from(a.month()),
        ),
        TemporalPrecision::Week => {
            let days = (b.date() - a.date()).num_days();
            Some(days / 7)
        }
        definite => {
            let precision = DateTimePrecision::from_unit(definite)?;
            let floor = |v: NaiveDateTime| {
                CqlDateTime::from_naive(v, precision, None)
                    .to_naive()
                    .unwrap_or(v)
            };
            Some((floor(b) - floor(a)).num_milliseconds() / precision.millis()?)
        }
    }
}

fn parse_two_digits(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Fractional seconds to milliseconds (`5` is 500 ms, extra digits dropped)
fn parse_fraction(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: String = s.chars().chain("00".chars()).take(3).collect();
    digits.parse().ok()
}

/// Split `10:30:00+05:00` into clock and offset minutes
fn split_offset(s: &str) -> Option<(&str, Option<i16>)> {
    if let Some(clock) = s.strip_suffix('Z') {
        return Some((clock, Some(0)));
    }
    match s.find(['+', '-']) {
        Some(pos) => {
            let (clock, tz) = s.split_at(pos);
            let sign: i16 = if tz.starts_with('-') { -1 } else { 1 };
            let (h, m) = tz[1..].split_once(':')?;
            let minutes = i16::from(parse_two_digits(h)?) * 60 + i16::from(parse_two_digits(m)?);
            Some((clock, Some(sign * minutes)))
        }
        None => Some((s, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dt(parts: &[i32]) -> CqlDateTime {
        CqlDateTime::from_parts(parts, None)
    }

    #[test]
    fn test_precision_follows_components() {
        assert_eq!(CqlDate::year_only(2024).precision(), DateTimePrecision::Year);
        assert_eq!(CqlDate::year_month(2024, 1).precision(), DateTimePrecision::Month);
        assert_eq!(dt(&[2024, 1, 1, 10, 30]).precision(), DateTimePrecision::Minute);
        assert_eq!(CqlTime::hour_only(10).precision(), DateTimePrecision::Hour);
    }

    #[test]
    fn test_compare_uncertain_when_precision_differs() {
        let year = CqlDate::year_only(2024);
        let month = CqlDate::year_month(2024, 1);
        assert_eq!(year.compare(&month), None);
        assert_eq!(
            CqlDate::year_only(2023).compare(&month),
            Some(Ordering::Less)
        );
        assert_eq!(
            CqlDate::new(2024, 1, 1).compare(&CqlDate::new(2024, 6, 15)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_seconds_and_milliseconds_are_one_precision() {
        let a = CqlTime {
            hour: 10,
            minute: Some(0),
            second: Some(0),
            millisecond: None,
        };
        let b = CqlTime::new(10, 0, 0, 0);
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_normalizes_offsets() {
        let utc = dt(&[2024, 1, 1, 12, 0]).with_offset(0);
        let plus_two = dt(&[2024, 1, 1, 14, 0]).with_offset(120);
        assert_eq!(utc.compare(&plus_two), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_at_precision() {
        let a = CqlDate::new(2024, 1, 15);
        let b = CqlDate::new(2024, 1, 20);
        assert_eq!(a.compare_at(&b, DateTimePrecision::Month), Some(Ordering::Equal));
        assert_eq!(a.compare_at(&b, DateTimePrecision::Day), Some(Ordering::Less));
        let coarse = CqlDate::year_month(2024, 1);
        assert_eq!(coarse.compare_at(&a, DateTimePrecision::Day), None);
    }

    #[test]
    fn test_add_month_clamps_day() {
        let jan31 = CqlDate::new(2024, 1, 31);
        assert_eq!(
            jan31.add(1, TemporalPrecision::Month),
            Some(CqlDate::new(2024, 2, 29))
        );
        assert_eq!(
            CqlDate::new(2023, 1, 31).add(1, TemporalPrecision::Month),
            Some(CqlDate::new(2023, 2, 28))
        );
    }

    #[test]
    fn test_add_finer_duration_truncates() {
        let month = CqlDate::year_month(2024, 1);
        assert_eq!(month.add(7, TemporalPrecision::Day), Some(month.clone()));
        assert_eq!(
            month.add(45, TemporalPrecision::Day),
            Some(CqlDate::year_month(2024, 2))
        );
        assert_eq!(
            CqlDate::new(2024, 1, 1).add(1, TemporalPrecision::Week),
            Some(CqlDate::new(2024, 1, 8))
        );
    }

    #[test]
    fn test_add_out_of_range_is_none() {
        assert_eq!(CqlDate::new(9999, 12, 31).add(1, TemporalPrecision::Day), None);
        assert_eq!(CqlDate::year_only(1).subtract(1, TemporalPrecision::Year), None);
    }

    #[test]
    fn test_time_arithmetic_wraps() {
        let t = CqlTime::hour_minute(23, 0);
        assert_eq!(
            t.add(2, TemporalPrecision::Hour),
            Some(CqlTime::hour_minute(1, 0))
        );
        assert_eq!(t.add(1, TemporalPrecision::Year), None);
    }

    #[test]
    fn test_duration_between_whole_years() {
        let birth = CqlDate::new(2000, 6, 15);
        let before_birthday = CqlDate::new(2024, 6, 14);
        let on_birthday = CqlDate::new(2024, 6, 15);
        assert_eq!(
            birth.duration_between(&before_birthday, TemporalPrecision::Year),
            Some(TemporalSpan::exact(23))
        );
        assert_eq!(
            birth.duration_between(&on_birthday, TemporalPrecision::Year),
            Some(TemporalSpan::exact(24))
        );
    }

    #[test]
    fn test_difference_counts_boundaries() {
        let a = CqlDate::new(2023, 12, 31);
        let b = CqlDate::new(2024, 1, 1);
        assert_eq!(
            a.difference_between(&b, TemporalPrecision::Year),
            Some(TemporalSpan::exact(1))
        );
        assert_eq!(
            a.duration_between(&b, TemporalPrecision::Year),
            Some(TemporalSpan::exact(0))
        );
    }

    #[test]
    fn test_duration_with_mixed_precision_is_range() {
        let a = CqlDate::new(2000, 6, 15);
        let b = CqlDate::year_only(2024);
        assert_eq!(
            a.duration_between(&b, TemporalPrecision::Year),
            Some(TemporalSpan { low: 23, high: 24 })
        );
        // the boundaries agree, so the answer is exact
        let c = CqlDate::year_month(2024, 3);
        assert_eq!(
            a.duration_between(&c, TemporalPrecision::Year),
            Some(TemporalSpan::exact(23))
        );
    }

    #[test]
    fn test_duration_with_coarse_operand_is_range() {
        let a = CqlDate::year_only(2020);
        let b = CqlDate::new(2021, 6, 15);
        let span = a.duration_between(&b, TemporalPrecision::Month).unwrap();
        assert_eq!(span, TemporalSpan { low: 5, high: 17 });
    }

    #[test]
    fn test_parse_and_display() {
        let value = CqlDateTime::parse("2024-01-15T10:30:00.5+05:30").unwrap();
        assert_eq!(value.millisecond, Some(500));
        assert_eq!(value.timezone_offset, Some(330));
        assert_eq!(value.to_string(), "2024-01-15T10:30:00.500+05:30");
        assert_eq!(CqlDate::parse("2024-02").unwrap().to_string(), "2024-02");
        assert_eq!(CqlDate::parse("2024-13"), None);
        assert_eq!(CqlTime::parse("T14:30").unwrap(), CqlTime::hour_minute(14, 30));
        assert_eq!(CqlDateTime::parse("2024T").unwrap().precision(), DateTimePrecision::Year);
    }

    #[test]
    fn test_parse_partial_components() {
        assert_eq!(CqlDate::parse("2024"), Some(CqlDate::year_only(2024)));
        assert_eq!(CqlDate::parse("2024-03-09"), Some(CqlDate::new(2024, 3, 9)));
        assert_eq!(CqlDate::parse("2024-3"), None);
        assert_eq!(CqlDate::parse("2024-03-9"), None);
        assert_eq!(CqlTime::parse("14"), Some(CqlTime::hour_only(14)));
        let seconds = CqlTime {
            hour: 14,
            minute: Some(30),
            second: Some(15),
            millisecond: None,
        };
        assert_eq!(CqlTime::parse("14:30:15"), Some(seconds));
        assert_eq!(CqlTime::parse("14:3"), None);
        assert_eq!(CqlTime::parse("14:30:1x"), None);
    }

    #[test]
    fn test_successor_steps_one_unit_of_precision() {
        assert_eq!(
            CqlDate::year_month(2024, 12).successor(),
            Some(CqlDate::year_month(2025, 1))
        );
        assert_eq!(CqlTime::new(23, 59, 59, 999).successor(), None);
    }
}
