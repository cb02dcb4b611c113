//! Interval Operators
//!
//! Implements the Allen relations (before, after, meets, overlaps, starts,
//! ends, includes, included in and their proper/before/after forms), point
//! membership, the set operations (union, intersect, except), collapse,
//! expand and the accessors start/end/width/size/point from.
//!
//! Every interval is first normalised to a closed span: open bounds are
//! closed through successor/predecessor and a missing bound becomes an
//! infinite endpoint. A single point is the degenerate span `[p, p]`.

use std::cmp::Ordering;

use cqlpath_ast::{IntervalOp, TemporalPrecision};
use cqlpath_types::{
    CqlInterval, CqlQuantity, CqlType, CqlValue, DateTimePrecision, promote,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{EvalError, EvalResult};
use crate::operators::arithmetic::{self, predecessor_of, successor_of};
use crate::operators::comparison::{compare_at, same_value};
use crate::operators::logical::{and3, or3};

// ============================================================================
// Closed spans
// ============================================================================

#[derive(Debug, Clone)]
enum Endpoint {
    NegInf,
    Point(CqlValue),
    PosInf,
}

#[derive(Debug, Clone)]
struct Span {
    start: Endpoint,
    end: Endpoint,
}

impl Span {
    fn of_interval(interval: &CqlInterval) -> Self {
        let start = match interval.low() {
            None => Endpoint::NegInf,
            Some(v) if interval.low_closed => Endpoint::Point(v.clone()),
            // an open bound at the type maximum leaves nothing inside
            Some(v) => successor_of(v).map_or(Endpoint::PosInf, Endpoint::Point),
        };
        let end = match interval.high() {
            None => Endpoint::PosInf,
            Some(v) if interval.high_closed => Endpoint::Point(v.clone()),
            Some(v) => predecessor_of(v).map_or(Endpoint::NegInf, Endpoint::Point),
        };
        Self { start, end }
    }

    fn of_value(value: &CqlValue) -> Self {
        match value {
            CqlValue::Interval(interval) => Self::of_interval(interval),
            point => Self {
                start: Endpoint::Point(point.clone()),
                end: Endpoint::Point(point.clone()),
            },
        }
    }
}

/// Compare two endpoints. Infinite endpoints order definitely against
/// everything; `None` only for uncertain point comparisons.
fn cmp_end(
    a: &Endpoint,
    b: &Endpoint,
    precision: Option<DateTimePrecision>,
) -> EvalResult<Option<Ordering>> {
    Ok(match (a, b) {
        (Endpoint::NegInf, Endpoint::NegInf) | (Endpoint::PosInf, Endpoint::PosInf) => {
            Some(Ordering::Equal)
        }
        (Endpoint::NegInf, _) | (_, Endpoint::PosInf) => Some(Ordering::Less),
        (_, Endpoint::NegInf) | (Endpoint::PosInf, _) => Some(Ordering::Greater),
        (Endpoint::Point(x), Endpoint::Point(y)) => compare_at(x, y, precision)?,
    })
}

/// Span algebra at an optional temporal precision
struct Relator {
    precision: Option<DateTimePrecision>,
}

impl Relator {
    fn cmp(&self, a: &Endpoint, b: &Endpoint) -> EvalResult<Option<Ordering>> {
        cmp_end(a, b, self.precision)
    }

    fn lt(&self, a: &Endpoint, b: &Endpoint) -> EvalResult<Option<bool>> {
        Ok(self.cmp(a, b)?.map(Ordering::is_lt))
    }

    fn le(&self, a: &Endpoint, b: &Endpoint) -> EvalResult<Option<bool>> {
        Ok(self.cmp(a, b)?.map(Ordering::is_le))
    }

    fn eq(&self, a: &Endpoint, b: &Endpoint) -> EvalResult<Option<bool>> {
        Ok(self.cmp(a, b)?.map(Ordering::is_eq))
    }

    fn is_empty(&self, span: &Span) -> EvalResult<bool> {
        Ok(self.cmp(&span.start, &span.end)? == Some(Ordering::Greater))
    }

    /// `succ(end of a) = start of b`
    fn meets_before(&self, a: &Span, b: &Span) -> EvalResult<Option<bool>> {
        match &a.end {
            Endpoint::Point(v) => match successor_of(v) {
                Some(next) => self.eq(&Endpoint::Point(next), &b.start),
                None => Ok(Some(false)),
            },
            _ => Ok(Some(false)),
        }
    }

    fn overlaps(&self, a: &Span, b: &Span) -> EvalResult<Option<bool>> {
        Ok(and3(self.le(&a.start, &b.end)?, self.le(&b.start, &a.end)?))
    }

    fn includes(&self, a: &Span, b: &Span) -> EvalResult<Option<bool>> {
        Ok(and3(self.le(&a.start, &b.start)?, self.le(&b.end, &a.end)?))
    }

    fn properly_includes(&self, a: &Span, b: &Span) -> EvalResult<Option<bool>> {
        let strict = or3(self.lt(&a.start, &b.start)?, self.lt(&b.end, &a.end)?);
        Ok(and3(self.includes(a, b)?, strict))
    }

    fn relate(&self, op: IntervalOp, a: &Span, b: &Span) -> EvalResult<Option<bool>> {
        if self.is_empty(a)? || self.is_empty(b)? {
            return Ok(Some(false));
        }
        Ok(match op {
            IntervalOp::Before => self.lt(&a.end, &b.start)?,
            IntervalOp::After => self.lt(&b.end, &a.start)?,
            IntervalOp::MeetsBefore => self.meets_before(a, b)?,
            IntervalOp::MeetsAfter => self.meets_before(b, a)?,
            IntervalOp::Meets => or3(self.meets_before(a, b)?, self.meets_before(b, a)?),
            IntervalOp::Overlaps => self.overlaps(a, b)?,
            IntervalOp::OverlapsBefore => {
                and3(self.lt(&a.start, &b.start)?, self.overlaps(a, b)?)
            }
            IntervalOp::OverlapsAfter => and3(self.lt(&b.end, &a.end)?, self.overlaps(a, b)?),
            IntervalOp::Starts => and3(self.eq(&a.start, &b.start)?, self.le(&a.end, &b.end)?),
            IntervalOp::Ends => and3(self.eq(&a.end, &b.end)?, self.le(&b.start, &a.start)?),
            IntervalOp::Includes => self.includes(a, b)?,
            IntervalOp::IncludedIn => self.includes(b, a)?,
            IntervalOp::ProperlyIncludes => self.properly_includes(a, b)?,
            IntervalOp::ProperlyIncludedIn => self.properly_includes(b, a)?,
            IntervalOp::SameAs => and3(self.eq(&a.start, &b.start)?, self.eq(&a.end, &b.end)?),
            IntervalOp::SameOrBefore => self.le(&a.end, &b.start)?,
            IntervalOp::SameOrAfter => self.le(&b.end, &a.start)?,
        })
    }
}

fn precision_of(unit: Option<TemporalPrecision>) -> Option<DateTimePrecision> {
    unit.and_then(DateTimePrecision::from_unit)
}

// ============================================================================
// Relations
// ============================================================================

/// Evaluate a timing relation between intervals and/or points
pub fn relation(
    op: IntervalOp,
    left: &CqlValue,
    right: &CqlValue,
    precision: Option<TemporalPrecision>,
) -> EvalResult<CqlValue> {
    if left.is_null() || right.is_null() {
        return Ok(CqlValue::Null);
    }
    let relator = Relator {
        precision: precision_of(precision),
    };
    let result = relator.relate(op, &Span::of_value(left), &Span::of_value(right))?;
    Ok(CqlValue::from_option_bool(result))
}

/// `point in interval`. Empty intervals contain nothing.
pub fn contains_point(
    interval: &CqlInterval,
    point: &CqlValue,
    precision: Option<TemporalPrecision>,
) -> EvalResult<Option<bool>> {
    if point.is_null() {
        return Ok(None);
    }
    let relator = Relator {
        precision: precision_of(precision),
    };
    let span = Span::of_interval(interval);
    if relator.is_empty(&span)? {
        return Ok(Some(false));
    }
    let p = Endpoint::Point(point.clone());
    Ok(and3(relator.le(&span.start, &p)?, relator.le(&p, &span.end)?))
}

/// Interval `=`: both closed spans match endpoint for endpoint
pub fn interval_equal(a: &CqlInterval, b: &CqlInterval) -> EvalResult<Option<bool>> {
    let (a, b) = promote_intervals(a, b)?;
    let relator = Relator { precision: None };
    let (sa, sb) = (Span::of_interval(&a), Span::of_interval(&b));
    if relator.is_empty(&sa)? && relator.is_empty(&sb)? {
        return Ok(Some(true));
    }
    Ok(and3(relator.eq(&sa.start, &sb.start)?, relator.eq(&sa.end, &sb.end)?))
}

/// Interval `~`: equality where an unknown answer counts as different
pub fn interval_equivalent(a: &CqlInterval, b: &CqlInterval) -> EvalResult<bool> {
    Ok(interval_equal(a, b)?.unwrap_or(false))
}

// ============================================================================
// Set operations
// ============================================================================

fn promote_intervals(a: &CqlInterval, b: &CqlInterval) -> EvalResult<(CqlInterval, CqlInterval)> {
    match promote(CqlValue::Interval(a.clone()), CqlValue::Interval(b.clone()))? {
        (CqlValue::Interval(a), CqlValue::Interval(b)) => Ok((a, b)),
        (l, r) => Err(EvalError::incompatible(&l.get_type(), &r.get_type())),
    }
}

fn point_type(a: &CqlInterval, b: &CqlInterval) -> CqlType {
    if a.point_type.is_any() {
        b.point_type.clone()
    } else {
        a.point_type.clone()
    }
}

fn low_bound(interval: &CqlInterval) -> (Option<CqlValue>, bool) {
    (interval.low().cloned(), interval.low_closed)
}

fn high_bound(interval: &CqlInterval) -> (Option<CqlValue>, bool) {
    (interval.high().cloned(), interval.high_closed)
}

/// `union`: defined when the operands overlap or meet, otherwise `Null`
pub fn union(a: &CqlInterval, b: &CqlInterval) -> EvalResult<CqlValue> {
    let (a, b) = promote_intervals(a, b)?;
    let relator = Relator { precision: None };
    let (sa, sb) = (Span::of_interval(&a), Span::of_interval(&b));
    if relator.is_empty(&sa)? {
        return Ok(CqlValue::Interval(b));
    }
    if relator.is_empty(&sb)? {
        return Ok(CqlValue::Interval(a));
    }
    let joined = or3(
        relator.overlaps(&sa, &sb)?,
        or3(relator.meets_before(&sa, &sb)?, relator.meets_before(&sb, &sa)?),
    );
    if joined != Some(true) {
        return Ok(CqlValue::Null);
    }
    let (low, low_closed) = match relator.cmp(&sa.start, &sb.start)? {
        Some(Ordering::Greater) => low_bound(&b),
        Some(_) => low_bound(&a),
        None => return Ok(CqlValue::Null),
    };
    let (high, high_closed) = match relator.cmp(&sa.end, &sb.end)? {
        Some(Ordering::Less) => high_bound(&b),
        Some(_) => high_bound(&a),
        None => return Ok(CqlValue::Null),
    };
    Ok(CqlValue::Interval(CqlInterval::new(
        point_type(&a, &b),
        low,
        low_closed,
        high,
        high_closed,
    )))
}

/// `intersect`: the overlap. Disjoint operands give an empty interval.
pub fn intersect(a: &CqlInterval, b: &CqlInterval) -> EvalResult<CqlValue> {
    let (a, b) = promote_intervals(a, b)?;
    let relator = Relator { precision: None };
    let (sa, sb) = (Span::of_interval(&a), Span::of_interval(&b));
    let (low, low_closed) = match relator.cmp(&sa.start, &sb.start)? {
        Some(Ordering::Less) => low_bound(&b),
        Some(_) => low_bound(&a),
        None => return Ok(CqlValue::Null),
    };
    let (high, high_closed) = match relator.cmp(&sa.end, &sb.end)? {
        Some(Ordering::Greater) => high_bound(&b),
        Some(_) => high_bound(&a),
        None => return Ok(CqlValue::Null),
    };
    Ok(CqlValue::Interval(CqlInterval::new(
        point_type(&a, &b),
        low,
        low_closed,
        high,
        high_closed,
    )))
}

/// `except`: `a` minus `b`. `Null` when `b` covers `a` or splits it in two.
pub fn except(a: &CqlInterval, b: &CqlInterval) -> EvalResult<CqlValue> {
    let (a, b) = promote_intervals(a, b)?;
    let relator = Relator { precision: None };
    let (sa, sb) = (Span::of_interval(&a), Span::of_interval(&b));
    if relator.is_empty(&sa)? || relator.is_empty(&sb)? {
        return Ok(CqlValue::Interval(a));
    }
    match relator.overlaps(&sa, &sb)? {
        Some(false) => return Ok(CqlValue::Interval(a)),
        None => return Ok(CqlValue::Null),
        Some(true) => {}
    }
    let starts_before = relator.le(&sb.start, &sa.start)?;
    let ends_after = relator.le(&sa.end, &sb.end)?;
    let point_type = point_type(&a, &b);
    Ok(match (starts_before, ends_after) {
        // b clips the low end of a
        (Some(true), Some(false)) => CqlValue::Interval(CqlInterval::new(
            point_type,
            b.high().cloned(),
            !b.high_closed,
            a.high().cloned(),
            a.high_closed,
        )),
        // b clips the high end of a
        (Some(false), Some(true)) => CqlValue::Interval(CqlInterval::new(
            point_type,
            a.low().cloned(),
            a.low_closed,
            b.low().cloned(),
            !b.low_closed,
        )),
        _ => CqlValue::Null,
    })
}

/// Merge overlapping or adjacent intervals. Nulls and empty intervals are
/// dropped; the result is ordered by start.
pub fn collapse(intervals: &[CqlValue]) -> EvalResult<CqlValue> {
    let relator = Relator { precision: None };
    let mut items = Vec::with_capacity(intervals.len());
    for value in intervals {
        match value {
            CqlValue::Null => {}
            CqlValue::Interval(interval) => {
                if !relator.is_empty(&Span::of_interval(interval))? {
                    items.push(interval.clone());
                }
            }
            other => {
                return Err(EvalError::invalid_argument(
                    "collapse",
                    format!("expected intervals, found {}", other.get_type()),
                ));
            }
        }
    }

    let mut failure = None;
    items.sort_by(|x, y| {
        match relator.cmp(&Span::of_interval(x).start, &Span::of_interval(y).start) {
            Ok(Some(ordering)) => ordering,
            Ok(None) => Ordering::Equal,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    let mut merged: Vec<CqlInterval> = Vec::with_capacity(items.len());
    for interval in items {
        if let Some(last) = merged.last_mut() {
            if let CqlValue::Interval(joined) = union(last, &interval)? {
                *last = joined;
                continue;
            }
        }
        merged.push(interval);
    }
    Ok(CqlValue::list(merged.into_iter().map(CqlValue::Interval).collect()))
}

// ============================================================================
// Expand
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Integer(i32),
    Long(i64),
    Decimal(Decimal),
    Temporal(i64, TemporalPrecision),
}

impl Step {
    fn advance(&self, value: &CqlValue) -> Option<CqlValue> {
        match (self, value) {
            (Self::Integer(n), CqlValue::Integer(i)) => i.checked_add(*n).map(CqlValue::Integer),
            (Self::Long(n), CqlValue::Long(l)) => l.checked_add(*n).map(CqlValue::Long),
            (Self::Decimal(n), CqlValue::Decimal(d)) => d.checked_add(*n).map(CqlValue::Decimal),
            (Self::Decimal(n), CqlValue::Quantity(q)) => q
                .value
                .checked_add(*n)
                .map(|v| CqlValue::Quantity(CqlQuantity::new(v, q.unit.clone()))),
            (Self::Temporal(n, unit), CqlValue::Date(d)) => d.add(*n, *unit).map(CqlValue::Date),
            (Self::Temporal(n, unit), CqlValue::DateTime(dt)) => {
                dt.add(*n, *unit).map(CqlValue::DateTime)
            }
            (Self::Temporal(n, unit), CqlValue::Time(t)) => t.add(*n, *unit).map(CqlValue::Time),
            _ => None,
        }
    }

    fn is_positive(&self) -> bool {
        match self {
            Self::Integer(n) => *n > 0,
            Self::Long(n) => *n > 0,
            Self::Decimal(n) => n.is_sign_positive() && !n.is_zero(),
            Self::Temporal(n, _) => *n > 0,
        }
    }
}

/// Pick the stride for `start`: `per` when given, otherwise one unit of
/// the point type (or of the value's precision for temporals)
fn step_for(start: &CqlValue, per: Option<&CqlValue>) -> Option<Step> {
    let whole = |d: Decimal| d.trunc().to_i64();
    match (start, per) {
        (CqlValue::Integer(_), None) => Some(Step::Integer(1)),
        (CqlValue::Long(_), None) => Some(Step::Long(1)),
        (CqlValue::Decimal(_) | CqlValue::Quantity(_), None) => Some(Step::Decimal(Decimal::ONE)),
        (CqlValue::Date(d), None) => Some(Step::Temporal(1, d.precision().unit())),
        (CqlValue::DateTime(dt), None) => Some(Step::Temporal(1, dt.precision().unit())),
        (CqlValue::Time(t), None) => Some(Step::Temporal(1, t.precision().unit())),

        (CqlValue::Date(_) | CqlValue::DateTime(_) | CqlValue::Time(_), Some(CqlValue::Quantity(q))) => {
            let unit = q.temporal_unit()?;
            Some(Step::Temporal(whole(q.value)?, unit))
        }
        (CqlValue::Integer(_), Some(per)) => match per {
            CqlValue::Integer(n) => Some(Step::Integer(*n)),
            other => i32::try_from(whole(other.as_decimal()?)?).ok().map(Step::Integer),
        },
        (CqlValue::Long(_), Some(per)) => per.as_long().map(Step::Long),
        (CqlValue::Decimal(_), Some(per)) => per.as_decimal().map(Step::Decimal),
        (CqlValue::Quantity(_), Some(CqlValue::Quantity(q))) => Some(Step::Decimal(q.value)),
        _ => None,
    }
}

/// Lazy walk over the points of a closed span. Cloning restarts from the
/// clone's position.
#[derive(Debug, Clone)]
pub struct ExpandIter {
    next: Option<CqlValue>,
    last: CqlValue,
    step: Step,
}

impl Iterator for ExpandIter {
    type Item = EvalResult<CqlValue>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        match compare_at(&current, &self.last, None) {
            Ok(Some(Ordering::Less | Ordering::Equal)) => {
                // Time arithmetic wraps at midnight; a point behind the
                // current one ends the walk
                self.next = self
                    .step
                    .advance(&current)
                    .filter(|next| is_after(next, &current));
                Some(Ok(current))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Points of a bounded interval. `None` for unbounded intervals or when no
/// stride applies to the point type.
pub fn expand_points(interval: &CqlInterval, per: Option<&CqlValue>) -> Option<ExpandIter> {
    let span = Span::of_interval(interval);
    let (Endpoint::Point(first), Endpoint::Point(last)) = (span.start, span.end) else {
        return None;
    };
    let step = step_for(&first, per)?;
    if !step.is_positive() {
        return None;
    }
    // a stride finer than the points' precision truncates to nothing
    let moves = step
        .advance(&first)
        .is_none_or(|next| !matches!(compare_at(&next, &first, None), Ok(Some(Ordering::Equal))));
    Some(ExpandIter {
        next: moves.then_some(first),
        last,
        step,
    })
}

fn is_after(next: &CqlValue, current: &CqlValue) -> bool {
    matches!(compare_at(next, current, None), Ok(Some(Ordering::Greater)))
}

fn collect_bounded(iter: ExpandIter, limit: usize) -> EvalResult<Vec<CqlValue>> {
    let points = iter.take(limit.saturating_add(1)).collect::<EvalResult<Vec<_>>>()?;
    if points.len() > limit {
        return Err(EvalError::expansion_limit(limit));
    }
    Ok(points)
}

/// `expand` over an interval or a list of intervals, materialised as a
/// list of points. Unbounded input is `Null`.
pub fn expand(value: &CqlValue, per: Option<&CqlValue>, limit: usize) -> EvalResult<CqlValue> {
    match value {
        CqlValue::Null => Ok(CqlValue::Null),
        CqlValue::Interval(interval) => match expand_points(interval, per) {
            Some(iter) => Ok(CqlValue::list(collect_bounded(iter, limit)?)),
            None => Ok(CqlValue::Null),
        },
        CqlValue::List(list) => {
            let mut points: Vec<CqlValue> = Vec::new();
            for item in list.iter() {
                let CqlValue::Interval(interval) = item else {
                    continue;
                };
                let Some(iter) = expand_points(interval, per) else {
                    return Ok(CqlValue::Null);
                };
                for point in collect_bounded(iter, limit)? {
                    if !points.iter().any(|p| same_value(p, &point)) {
                        points.push(point);
                    }
                }
                if points.len() > limit {
                    return Err(EvalError::expansion_limit(limit));
                }
            }
            Ok(CqlValue::list(points))
        }
        other => Err(EvalError::invalid_argument(
            "expand",
            format!("expected an interval, found {}", other.get_type()),
        )),
    }
}

// ============================================================================
// Accessors
// ============================================================================

/// `start of`: the closed low point; the type minimum when unbounded
pub fn start(interval: &CqlInterval) -> CqlValue {
    match Span::of_interval(interval).start {
        Endpoint::Point(v) => v,
        Endpoint::NegInf => CqlValue::minimum(&interval.point_type).unwrap_or(CqlValue::Null),
        Endpoint::PosInf => CqlValue::Null,
    }
}

/// `end of`: the closed high point; the type maximum when unbounded
pub fn end(interval: &CqlInterval) -> CqlValue {
    match Span::of_interval(interval).end {
        Endpoint::Point(v) => v,
        Endpoint::PosInf => CqlValue::maximum(&interval.point_type).unwrap_or(CqlValue::Null),
        Endpoint::NegInf => CqlValue::Null,
    }
}

fn is_temporal_type(point_type: &CqlType) -> bool {
    matches!(point_type, CqlType::Date | CqlType::DateTime | CqlType::Time)
}

/// `width of`: `end - start`. Temporal intervals have no width.
pub fn width(interval: &CqlInterval) -> EvalResult<CqlValue> {
    if is_temporal_type(&interval.point_type) {
        return Ok(CqlValue::Null);
    }
    let (Some(low), Some(high)) = (interval.low(), interval.high()) else {
        return Ok(CqlValue::Null);
    };
    arithmetic::subtract(high, low)
}

/// `size of`: number of points, `end - start + 1` at the point step
pub fn size(interval: &CqlInterval) -> EvalResult<CqlValue> {
    if is_temporal_type(&interval.point_type) {
        return Ok(CqlValue::Null);
    }
    let span = Span::of_interval(interval);
    let (Endpoint::Point(first), Endpoint::Point(last)) = (span.start, span.end) else {
        return Ok(CqlValue::Null);
    };
    let distance = arithmetic::subtract(&last, &first)?;
    match &distance {
        CqlValue::Integer(_) => arithmetic::add(&distance, &CqlValue::Integer(1)),
        CqlValue::Long(_) => arithmetic::add(&distance, &CqlValue::Long(1)),
        CqlValue::Decimal(_) => {
            arithmetic::add(&distance, &CqlValue::Decimal(arithmetic::decimal_step()))
        }
        CqlValue::Quantity(q) => arithmetic::add(
            &distance,
            &CqlValue::Quantity(CqlQuantity::new(arithmetic::decimal_step(), q.unit.clone())),
        ),
        _ => Ok(CqlValue::Null),
    }
}

/// `point from`: the single point of a unit interval, otherwise `Null`
pub fn point_from(interval: &CqlInterval) -> EvalResult<CqlValue> {
    let span = Span::of_interval(interval);
    let (Endpoint::Point(first), Endpoint::Point(last)) = (&span.start, &span.end) else {
        return Ok(CqlValue::Null);
    };
    Ok(match compare_at(first, last, None)? {
        Some(Ordering::Equal) => first.clone(),
        _ => CqlValue::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlpath_types::{CqlDate, CqlTime};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn int_iv(low: i32, lc: bool, high: i32, hc: bool) -> CqlInterval {
        CqlInterval::new(
            CqlType::Integer,
            Some(CqlValue::Integer(low)),
            lc,
            Some(CqlValue::Integer(high)),
            hc,
        )
    }

    fn closed(low: i32, high: i32) -> CqlInterval {
        int_iv(low, true, high, true)
    }

    fn ints(values: &[i32]) -> CqlValue {
        CqlValue::list(values.iter().copied().map(CqlValue::Integer).collect())
    }

    #[rstest]
    #[case(5, closed(1, 10), Some(true))]
    #[case(10, int_iv(1, true, 10, false), Some(false))]
    #[case(1, int_iv(1, false, 10, true), Some(false))]
    #[case(0, closed(1, 10), Some(false))]
    fn test_point_membership(
        #[case] point: i32,
        #[case] interval: CqlInterval,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(
            contains_point(&interval, &CqlValue::Integer(point), None).unwrap(),
            expected
        );
    }

    #[test]
    fn test_empty_interval_contains_nothing() {
        let empty = closed(5, 1);
        assert_eq!(contains_point(&empty, &CqlValue::Integer(3), None).unwrap(), Some(false));
    }

    #[rstest]
    #[case(IntervalOp::Before, closed(1, 3), closed(5, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::After, closed(1, 3), closed(5, 8), CqlValue::Boolean(false))]
    #[case(IntervalOp::Meets, closed(1, 4), closed(5, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::MeetsBefore, closed(1, 4), closed(5, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::MeetsAfter, closed(1, 4), closed(5, 8), CqlValue::Boolean(false))]
    #[case(IntervalOp::Overlaps, closed(1, 5), closed(5, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::OverlapsBefore, closed(1, 5), closed(3, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::OverlapsAfter, closed(1, 5), closed(3, 8), CqlValue::Boolean(false))]
    #[case(IntervalOp::Starts, closed(1, 3), closed(1, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::Ends, closed(5, 8), closed(1, 8), CqlValue::Boolean(true))]
    #[case(IntervalOp::Includes, closed(1, 10), closed(3, 4), CqlValue::Boolean(true))]
    #[case(IntervalOp::IncludedIn, closed(3, 4), closed(1, 10), CqlValue::Boolean(true))]
    #[case(IntervalOp::ProperlyIncludes, closed(1, 10), closed(1, 10), CqlValue::Boolean(false))]
    #[case(IntervalOp::SameAs, int_iv(0, false, 5, false), closed(1, 4), CqlValue::Boolean(true))]
    fn test_allen_relations(
        #[case] op: IntervalOp,
        #[case] left: CqlInterval,
        #[case] right: CqlInterval,
        #[case] expected: CqlValue,
    ) {
        let result = relation(op, &CqlValue::Interval(left), &CqlValue::Interval(right), None).unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_unbounded_high_is_never_before() {
        let open_ended = CqlInterval::new(CqlType::Integer, Some(CqlValue::Integer(1)), true, None, true);
        let result = relation(
            IntervalOp::Before,
            &CqlValue::Interval(open_ended),
            &CqlValue::Interval(closed(1000, 2000)),
            None,
        )
        .unwrap();
        assert_eq!(result, CqlValue::Boolean(false));
    }

    #[test]
    fn test_uncertain_point_comparison_is_null() {
        let year = CqlValue::Date(CqlDate::year_only(2024));
        let interval = CqlInterval::closed(
            CqlType::Date,
            CqlValue::Date(CqlDate::new(2024, 3, 1)),
            CqlValue::Date(CqlDate::new(2024, 5, 1)),
        );
        assert_eq!(contains_point(&interval, &year, None).unwrap(), None);
    }

    #[test]
    fn test_union_requires_overlap_or_meet() {
        assert_eq!(
            union(&closed(1, 4), &closed(5, 8)).unwrap(),
            CqlValue::Interval(closed(1, 8))
        );
        assert_eq!(union(&closed(1, 3), &closed(5, 8)).unwrap(), CqlValue::Null);
    }

    #[test]
    fn test_intersect_and_except() {
        assert_eq!(
            intersect(&closed(1, 10), &closed(5, 15)).unwrap(),
            CqlValue::Interval(closed(5, 10))
        );
        assert_eq!(
            except(&closed(1, 10), &closed(5, 15)).unwrap(),
            CqlValue::Interval(int_iv(1, true, 5, false))
        );
        // splitting and covering are not representable as one interval
        assert_eq!(except(&closed(1, 10), &closed(4, 6)).unwrap(), CqlValue::Null);
        assert_eq!(except(&closed(3, 4), &closed(1, 10)).unwrap(), CqlValue::Null);
        assert_eq!(
            except(&closed(1, 3), &closed(5, 8)).unwrap(),
            CqlValue::Interval(closed(1, 3))
        );
    }

    #[test]
    fn test_collapse_is_idempotent() {
        let input = vec![
            CqlValue::Interval(closed(5, 8)),
            CqlValue::Null,
            CqlValue::Interval(closed(1, 3)),
            CqlValue::Interval(closed(4, 4)),
            CqlValue::Interval(closed(10, 12)),
        ];
        let once = collapse(&input).unwrap();
        assert_eq!(
            once,
            CqlValue::list(vec![
                CqlValue::Interval(closed(1, 8)),
                CqlValue::Interval(closed(10, 12)),
            ])
        );
        let twice = collapse(once.as_list().unwrap().elements.as_slice()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_expand_points() {
        let result = expand(&CqlValue::Interval(int_iv(1, true, 4, false)), None, 100).unwrap();
        assert_eq!(result, ints(&[1, 2, 3]));
        let by_two = expand(&CqlValue::Interval(closed(1, 6)), Some(&CqlValue::Integer(2)), 100).unwrap();
        assert_eq!(by_two, ints(&[1, 3, 5]));
    }

    #[test]
    fn test_expand_iterator_restarts() {
        let iter = expand_points(&closed(1, 3), None).unwrap();
        let first: Vec<_> = iter.clone().collect::<EvalResult<_>>().unwrap();
        let second: Vec<_> = iter.collect::<EvalResult<_>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expand_limits() {
        let unbounded = CqlInterval::new(CqlType::Integer, Some(CqlValue::Integer(1)), true, None, true);
        assert_eq!(expand(&CqlValue::Interval(unbounded), None, 10).unwrap(), CqlValue::Null);
        let result = expand(&CqlValue::Interval(closed(1, 100)), None, 10);
        assert_eq!(result, Err(EvalError::expansion_limit(10)));
    }

    #[test]
    fn test_expand_time_stops_before_midnight() {
        let hours = CqlInterval::closed(
            CqlType::Time,
            CqlValue::Time(CqlTime::hour_only(22)),
            CqlValue::Time(CqlTime::hour_only(23)),
        );
        let result = expand(&CqlValue::Interval(hours), None, 1000).unwrap();
        assert_eq!(
            result,
            CqlValue::list(vec![
                CqlValue::Time(CqlTime::hour_only(22)),
                CqlValue::Time(CqlTime::hour_only(23)),
            ])
        );
    }

    #[test]
    fn test_expand_with_stride_finer_than_precision_is_empty() {
        let months = CqlInterval::closed(
            CqlType::Date,
            CqlValue::Date(CqlDate::year_month(2024, 1)),
            CqlValue::Date(CqlDate::year_month(2024, 3)),
        );
        let per_day = CqlValue::Quantity(CqlQuantity::new(Decimal::ONE, "day"));
        let result = expand(&CqlValue::Interval(months), Some(&per_day), 1000).unwrap();
        assert_eq!(result, CqlValue::list(Vec::new()));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(point_from(&closed(5, 5)).unwrap(), CqlValue::Integer(5));
        assert_eq!(point_from(&closed(5, 6)).unwrap(), CqlValue::Null);
        assert_eq!(start(&int_iv(1, false, 10, true)), CqlValue::Integer(2));
        assert_eq!(end(&int_iv(1, true, 10, false)), CqlValue::Integer(9));
        assert_eq!(width(&closed(3, 7)).unwrap(), CqlValue::Integer(4));
        assert_eq!(size(&closed(3, 7)).unwrap(), CqlValue::Integer(5));
    }
}
