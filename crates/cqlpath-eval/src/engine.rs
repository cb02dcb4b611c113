//! CQL Evaluation Engine
//!
//! This module provides the main `CqlEngine` struct which walks expression
//! trees against an evaluation context. Operators dispatch to the
//! value-level implementations in [`operators`](crate::operators); named
//! functions go through the [`FunctionRegistry`].

use cqlpath_ast::{
    BinaryOp, CaseItem, DateTimeLiteral, Expression, IntervalOp, Literal, OptBoxExpr,
    QuantityLiteral, TemporalPrecision, TypeSpecifier, UnaryOp,
};
use cqlpath_types::{
    CqlCode, CqlConcept, CqlDate, CqlDateTime, CqlInterval, CqlQuantity, CqlRatio, CqlTime,
    CqlTuple, CqlType, CqlValue,
};

use crate::config::EngineConfig;
use crate::context::{EvaluationContext, EvaluationContextBuilder, INDEX, TOTAL};
use crate::error::{EvalError, EvalResult};
use crate::operators::comparison::equal;
use crate::operators::{apply_binary, apply_unary, datetime, interval, list, string, type_ops};
use crate::provider::navigate_value;
use crate::registry::FunctionRegistry;

/// The main evaluation engine
///
/// The engine holds no per-run state: it is immutable once built and can be
/// shared between threads, each evaluating with its own context.
#[derive(Debug, Clone)]
pub struct CqlEngine {
    registry: FunctionRegistry,
    config: EngineConfig,
}

impl Default for CqlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CqlEngine {
    /// Create an engine with the default configuration and all built-ins
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: FunctionRegistry::standard(&config),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Get a mutable reference to the registry, e.g. to add host functions
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Context builder preset with this engine's clock offset
    pub fn context_builder(&self) -> EvaluationContextBuilder {
        EvaluationContext::builder().timezone_offset(self.config.default_timezone_offset)
    }

    /// Evaluate an expression
    ///
    /// Every call counts one level against `max_recursion_depth`; going
    /// deeper is a `StackOverflow` error rather than a native stack fault.
    pub fn evaluate(&self, expr: &Expression, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        ctx.enter(self.config.max_recursion_depth)?;
        let result = self.dispatch(expr, ctx);
        ctx.exit();
        result
    }

    /// One call per variant. Arm bodies live in their own non-inlined
    /// methods so the frame that recurses stays small.
    fn dispatch(&self, expr: &Expression, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        match expr {
            // === Literals ===
            Expression::Literal(lit) => self.eval_literal(lit, ctx),

            // === References ===
            Expression::Identifier(name) => self.eval_identifier(name, ctx),
            Expression::QualifiedIdentifier { library, name } => {
                self.eval_qualified_identifier(library, name, ctx)
            }
            Expression::Property { source, path } => self.eval_property(source, path, ctx),

            // === Operators ===
            Expression::BinaryOp { op, left, right } => self.eval_binary(*op, left, right, ctx),
            Expression::UnaryOp { op, operand } => self.eval_unary(*op, operand, ctx),
            Expression::IntervalOp {
                op,
                precision,
                left,
                right,
            } => self.eval_interval_op(*op, *precision, left, right, ctx),
            Expression::Between { operand, low, high } => {
                self.eval_between(operand, low, high, ctx)
            }

            // === Type operations ===
            Expression::Is {
                operand,
                type_specifier,
            } => self.eval_is(operand, type_specifier, ctx),
            Expression::As {
                operand,
                type_specifier,
                strict,
            } => self.eval_as(operand, type_specifier, *strict, ctx),
            Expression::Convert {
                operand,
                type_specifier,
            } => self.eval_convert(operand, type_specifier, ctx),
            Expression::MinValue(spec) => type_bound(spec, false),
            Expression::MaxValue(spec) => type_bound(spec, true),

            // === Conditionals ===
            Expression::If {
                condition,
                then_expr,
                else_expr,
            } => self.eval_if(condition, then_expr, else_expr, ctx),
            Expression::Case {
                comparand,
                items,
                else_expr,
            } => self.eval_case(comparand.as_deref(), items, else_expr, ctx),
            Expression::Coalesce(operands) => self.eval_coalesce(operands, ctx),

            // === Constructors ===
            Expression::List(elements) => self.eval_list(elements, ctx),
            Expression::Tuple(elements) => self.eval_tuple(elements, ctx),
            Expression::Interval {
                low,
                low_closed,
                high,
                high_closed,
            } => self.eval_interval(low, *low_closed, high, *high_closed, ctx),
            Expression::Code {
                code,
                system,
                display,
            } => Ok(CqlValue::Code(self.eval_code(
                code,
                system.as_deref(),
                display.as_deref(),
                ctx,
            ))),
            Expression::Concept { codes, display } => {
                self.eval_concept(codes, display.as_deref(), ctx)
            }
            Expression::Indexer { source, index } => self.eval_indexer(source, index, ctx),

            // === Temporal ===
            Expression::DurationBetween {
                precision,
                low,
                high,
            } => self.eval_duration(*precision, low, high, ctx),
            Expression::DifferenceBetween {
                precision,
                low,
                high,
            } => self.eval_difference(*precision, low, high, ctx),
            Expression::DateTimeComponent { precision, operand } => {
                self.eval_component(*precision, operand, ctx)
            }
            Expression::Now => Ok(CqlValue::DateTime(ctx.now())),
            Expression::Today => Ok(CqlValue::Date(ctx.today())),
            Expression::TimeOfDay => Ok(CqlValue::Time(ctx.time_of_day())),
            Expression::Expand { operand, per } => self.eval_expand(operand, per, ctx),

            // === FHIRPath iteration variables ===
            Expression::This => Ok(ctx.focus().cloned().unwrap_or(CqlValue::Null)),
            Expression::Index => ctx
                .lookup(INDEX)
                .cloned()
                .ok_or_else(|| EvalError::undefined_reference(INDEX)),
            Expression::Total => ctx
                .lookup(TOTAL)
                .cloned()
                .ok_or_else(|| EvalError::undefined_reference(TOTAL)),

            // === Calls ===
            Expression::FunctionCall {
                library,
                name,
                args,
            } => self.eval_function_call(library.as_deref(), name, args, ctx),
            Expression::Invocation { source, name, args } => {
                self.eval_invocation(source, name, args, ctx)
            }

            // === Queries ===
            Expression::Query(query) => self.eval_query(query, ctx),
            Expression::Retrieve(retrieve) => self.eval_retrieve(retrieve, ctx),
        }
    }

    pub(crate) fn evaluate_all_of(
        &self,
        exprs: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<CqlValue>> {
        exprs.iter().map(|e| self.evaluate(e, ctx)).collect()
    }

    // ========================================================================
    // Literals
    // ========================================================================

    #[inline(never)]
    fn eval_literal(&self, lit: &Literal, ctx: &EvaluationContext) -> EvalResult<CqlValue> {
        Ok(match lit {
            Literal::Null => CqlValue::Null,
            Literal::Boolean(b) => CqlValue::Boolean(*b),
            Literal::Integer(i) => CqlValue::Integer(*i),
            Literal::Long(l) => CqlValue::Long(*l),
            Literal::Decimal(d) => CqlValue::Decimal(*d),
            Literal::String(s) => CqlValue::String(s.clone()),
            Literal::Date(d) => {
                let date = CqlDate {
                    year: d.year,
                    month: d.month,
                    day: d.day,
                };
                if !date.is_valid() {
                    return Err(EvalError::invalid_argument(
                        "Date",
                        format!("{date} is not a calendar date"),
                    ));
                }
                CqlValue::Date(date)
            }
            Literal::DateTime(dt) => CqlValue::DateTime(datetime_literal(dt, ctx)?),
            Literal::Time(t) => {
                let time = CqlTime {
                    hour: t.hour,
                    minute: t.minute,
                    second: t.second,
                    millisecond: t.millisecond,
                };
                if !time.is_valid() {
                    return Err(EvalError::invalid_argument(
                        "Time",
                        format!("{time} is not a valid time"),
                    ));
                }
                CqlValue::Time(time)
            }
            Literal::Quantity(q) => CqlValue::Quantity(quantity_literal(q)),
            Literal::Ratio(r) => CqlValue::Ratio(CqlRatio::new(
                quantity_literal(&r.numerator),
                quantity_literal(&r.denominator),
            )),
        })
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Resolve a bare identifier: scopes, parameters, library members, the
    /// context name, then a property of the focus
    #[inline(never)]
    fn eval_identifier(&self, name: &str, ctx: &mut EvaluationContext) -> EvalResult<CqlValue> {
        if let Some(value) = ctx.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = ctx.parameter(name) {
            return Ok(value.clone());
        }
        if let Some(library) = ctx.current_library() {
            if let Some(value) = self.resolve_library_member(&library, name, ctx)? {
                return Ok(value);
            }
        }
        if ctx.context_type() == Some(name) {
            if let Some(subject) = ctx.context_value() {
                return Ok(subject.clone());
            }
        }
        match ctx.focus().cloned() {
            Some(focus @ (CqlValue::Tuple(_) | CqlValue::List(_))) => {
                // `Patient.name`: a leading type name selects the focus itself
                if type_ops::is_type(&focus, &CqlType::named(name)) {
                    return Ok(focus);
                }
                self.navigate(&focus, name, ctx)
            }
            _ => Err(EvalError::undefined_reference(name)),
        }
    }

    #[inline(never)]
    fn eval_property(
        &self,
        source: &Expression,
        path: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let record = self.evaluate(source, ctx)?;
        self.navigate(&record, path, ctx)
    }

    /// Property access through the data provider when one is configured
    pub(crate) fn navigate(
        &self,
        record: &CqlValue,
        path: &str,
        ctx: &EvaluationContext,
    ) -> EvalResult<CqlValue> {
        match ctx.provider() {
            Some(provider) if !record.is_null() => provider.navigate(record, path),
            _ => Ok(navigate_value(record, path)),
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    #[inline(never)]
    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.evaluate(left, ctx)?;
        // the right operand cannot change these outcomes
        match op {
            BinaryOp::And if left.is_false() => return Ok(CqlValue::Boolean(false)),
            BinaryOp::Or if left.is_true() => return Ok(CqlValue::Boolean(true)),
            BinaryOp::Implies if left.is_false() => return Ok(CqlValue::Boolean(true)),
            _ => {}
        }
        let right = self.evaluate(right, ctx)?;
        apply_binary(op, &left, &right)
    }

    #[inline(never)]
    fn eval_unary(
        &self,
        op: UnaryOp,
        operand: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        apply_unary(op, &value)
    }

    #[inline(never)]
    fn eval_interval_op(
        &self,
        op: IntervalOp,
        precision: Option<TemporalPrecision>,
        left: &Expression,
        right: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let left = self.evaluate(left, ctx)?;
        let right = self.evaluate(right, ctx)?;
        eval_timing(op, precision, &left, &right)
    }

    #[inline(never)]
    fn eval_between(
        &self,
        operand: &Expression,
        low: &Expression,
        high: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        let low = self.evaluate(low, ctx)?;
        let high = self.evaluate(high, ctx)?;
        let above = apply_binary(BinaryOp::GreaterOrEqual, &value, &low)?;
        let below = apply_binary(BinaryOp::LessOrEqual, &value, &high)?;
        apply_binary(BinaryOp::And, &above, &below)
    }

    // ========================================================================
    // Type operations
    // ========================================================================

    #[inline(never)]
    fn eval_is(
        &self,
        operand: &Expression,
        type_specifier: &TypeSpecifier,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        let target = CqlType::from_specifier(type_specifier);
        Ok(CqlValue::Boolean(type_ops::is_type(&value, &target)))
    }

    #[inline(never)]
    fn eval_as(
        &self,
        operand: &Expression,
        type_specifier: &TypeSpecifier,
        strict: bool,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        type_ops::as_type(value, &CqlType::from_specifier(type_specifier), strict)
    }

    #[inline(never)]
    fn eval_convert(
        &self,
        operand: &Expression,
        type_specifier: &TypeSpecifier,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        type_ops::convert(value, &CqlType::from_specifier(type_specifier))
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    #[inline(never)]
    fn eval_if(
        &self,
        condition: &Expression,
        then_expr: &Expression,
        else_expr: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if self.evaluate(condition, ctx)?.is_true() {
            self.evaluate(then_expr, ctx)
        } else {
            self.evaluate(else_expr, ctx)
        }
    }

    #[inline(never)]
    fn eval_case(
        &self,
        comparand: Option<&Expression>,
        items: &[CaseItem],
        else_expr: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let comparand = comparand.map(|c| self.evaluate(c, ctx)).transpose()?;
        for item in items {
            let when = self.evaluate(&item.when, ctx)?;
            let selected = match &comparand {
                Some(value) => equal(value, &when)? == Some(true),
                None => when.is_true(),
            };
            if selected {
                return self.evaluate(&item.then, ctx);
            }
        }
        self.evaluate(else_expr, ctx)
    }

    /// First non-null operand. A lone list operand is searched instead.
    #[inline(never)]
    fn eval_coalesce(
        &self,
        operands: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if let [only] = operands {
            return match self.evaluate(only, ctx)? {
                CqlValue::List(items) => Ok(items
                    .into_iter()
                    .find(|v| !v.is_null())
                    .unwrap_or(CqlValue::Null)),
                other => Ok(other),
            };
        }
        for operand in operands {
            let value = self.evaluate(operand, ctx)?;
            if !value.is_null() {
                return Ok(value);
            }
        }
        Ok(CqlValue::Null)
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Interval selector. A low bound above the high bound builds an empty
    /// interval.
    #[inline(never)]
    fn eval_interval(
        &self,
        low: &OptBoxExpr,
        low_closed: bool,
        high: &OptBoxExpr,
        high_closed: bool,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = match low {
            Some(expr) => self.evaluate(expr, ctx)?,
            None => CqlValue::Null,
        };
        let high = match high {
            Some(expr) => self.evaluate(expr, ctx)?,
            None => CqlValue::Null,
        };
        let interval = CqlInterval::try_new(low, low_closed, high, high_closed)?;
        Ok(CqlValue::Interval(interval))
    }

    /// Code selector. `system` names a codesystem declared in the current
    /// library or is the system URL itself.
    #[inline(never)]
    fn eval_code(
        &self,
        code: &str,
        system: Option<&str>,
        display: Option<&str>,
        ctx: &EvaluationContext,
    ) -> CqlCode {
        let declared = system.and_then(|name| {
            ctx.current_library()
                .and_then(|lib| lib.codesystem(name).map(|cs| (cs.id.clone(), cs.version.clone())))
        });
        let (system, version) = match declared {
            Some(found) => found,
            None => (system.unwrap_or_default().to_string(), None),
        };
        let mut result = CqlCode::new(code, system);
        if let Some(display) = display {
            result = result.with_display(display);
        }
        if let Some(version) = version {
            result = result.with_version(version);
        }
        result
    }

    #[inline(never)]
    fn eval_list(
        &self,
        elements: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let values = self.evaluate_all_of(elements, ctx)?;
        Ok(CqlValue::list(values))
    }

    #[inline(never)]
    fn eval_tuple(
        &self,
        elements: &[(String, Expression)],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut tuple = CqlTuple::new();
        for (name, element) in elements {
            tuple.set(name.clone(), self.evaluate(element, ctx)?);
        }
        Ok(CqlValue::Tuple(tuple))
    }

    /// Concept selector; null codes are dropped
    #[inline(never)]
    fn eval_concept(
        &self,
        codes: &[Expression],
        display: Option<&str>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut members = Vec::with_capacity(codes.len());
        for code in codes {
            match self.evaluate(code, ctx)? {
                CqlValue::Code(c) => members.push(c),
                CqlValue::Null => {}
                other => {
                    return Err(EvalError::incompatible(&other.get_type(), &CqlType::Code));
                }
            }
        }
        Ok(CqlValue::Concept(CqlConcept::new(
            members,
            display.map(str::to_string),
        )))
    }

    #[inline(never)]
    fn eval_indexer(
        &self,
        source: &Expression,
        index: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let source = self.evaluate(source, ctx)?;
        let index = self.evaluate(index, ctx)?;
        let Some(i) = index.as_integer() else {
            return Ok(CqlValue::Null);
        };
        match &source {
            CqlValue::String(s) => Ok(string::indexer(s, i)),
            CqlValue::List(_) => Ok(list::indexer(&source, i)),
            CqlValue::Null => Ok(CqlValue::Null),
            other => Err(EvalError::invalid_argument(
                "Indexer",
                format!("cannot index into {}", other.get_type()),
            )),
        }
    }

    // ========================================================================
    // Temporal
    // ========================================================================

    #[inline(never)]
    fn eval_duration(
        &self,
        precision: TemporalPrecision,
        low: &Expression,
        high: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = self.evaluate(low, ctx)?;
        let high = self.evaluate(high, ctx)?;
        datetime::duration_between(precision, &low, &high)
    }

    #[inline(never)]
    fn eval_difference(
        &self,
        precision: TemporalPrecision,
        low: &Expression,
        high: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let low = self.evaluate(low, ctx)?;
        let high = self.evaluate(high, ctx)?;
        datetime::difference_between(precision, &low, &high)
    }

    #[inline(never)]
    fn eval_component(
        &self,
        precision: TemporalPrecision,
        operand: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        datetime::component(&value, precision)
    }

    /// `expand`; a null `per` means the default stride
    #[inline(never)]
    fn eval_expand(
        &self,
        operand: &Expression,
        per: &OptBoxExpr,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let value = self.evaluate(operand, ctx)?;
        let per = per.as_ref().map(|p| self.evaluate(p, ctx)).transpose()?;
        let per = per.as_ref().filter(|p| !p.is_null());
        interval::expand(&value, per, self.config.max_expansion_size)
    }
}

/// `minimum Integer` / `maximum Integer`
fn type_bound(spec: &TypeSpecifier, max: bool) -> EvalResult<CqlValue> {
    let target = CqlType::from_specifier(spec);
    if max {
        type_ops::max_value(&target)
    } else {
        type_ops::min_value(&target)
    }
}

/// Timing relation, with list inclusion for `includes`/`included in`
fn eval_timing(
    op: IntervalOp,
    precision: Option<TemporalPrecision>,
    left: &CqlValue,
    right: &CqlValue,
) -> EvalResult<CqlValue> {
    match (op, left, right) {
        (IntervalOp::Includes, CqlValue::List(_), _) => Ok(list::includes(left, right)),
        (IntervalOp::IncludedIn, _, CqlValue::List(_)) => Ok(list::includes(right, left)),
        (IntervalOp::ProperlyIncludes, CqlValue::List(_), CqlValue::List(_)) => {
            Ok(properly_includes(left, right))
        }
        (IntervalOp::ProperlyIncludedIn, CqlValue::List(_), CqlValue::List(_)) => {
            Ok(properly_includes(right, left))
        }
        _ => interval::relation(op, left, right, precision),
    }
}

fn properly_includes(a: &CqlValue, b: &CqlValue) -> CqlValue {
    let included = list::includes(a, b);
    if !included.is_true() {
        return included;
    }
    let size = |v: &CqlValue| list::distinct(v).as_list().map_or(0, |l| l.len());
    CqlValue::Boolean(size(a) > size(b))
}

fn quantity_literal(q: &QuantityLiteral) -> CqlQuantity {
    CqlQuantity::new(q.value, q.unit.clone().unwrap_or_default())
}

/// DateTime literal; without an offset the evaluation clock's applies
fn datetime_literal(dt: &DateTimeLiteral, ctx: &EvaluationContext) -> EvalResult<CqlDateTime> {
    let components = [
        dt.date.month.map(i32::from),
        dt.date.day.map(i32::from),
        dt.hour.map(i32::from),
        dt.minute.map(i32::from),
        dt.second.map(i32::from),
        dt.millisecond.map(i32::from),
    ];
    let mut parts = vec![dt.date.year];
    parts.extend(components.into_iter().map_while(|c| c));
    let offset = match dt.offset_minutes {
        Some(minutes) => Some(i16::try_from(minutes).map_err(|_| {
            EvalError::invalid_argument("DateTime", format!("timezone offset {minutes} out of range"))
        })?),
        None => ctx.now().timezone_offset,
    };
    let value = CqlDateTime::from_parts(&parts, offset);
    if !value.is_valid() {
        return Err(EvalError::invalid_argument(
            "DateTime",
            format!("{value} is not a valid datetime"),
        ));
    }
    Ok(value)
}
