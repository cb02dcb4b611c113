//! Built-in function registry
//!
//! Maps function names to overloaded signatures and their implementations.
//! Names are matched case-insensitively so that CQL (`ToInteger`, `First`)
//! and FHIRPath (`toInteger()`, `first()`) spellings share one entry.
//!
//! Overload resolution works on the runtime types of the evaluated
//! arguments: every overload whose parameters accept the arguments is
//! scored by the summed implicit conversion cost and the cheapest wins.

use std::collections::HashMap;
use std::sync::Arc;

use cqlpath_types::{CqlType, CqlValue, coerce, conversion_cost};

use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::error::{EvalError, EvalResult};
use crate::operators::{
    aggregate, apply_binary, apply_unary, arithmetic, clinical, datetime, interval, list, string,
    type_ops,
};

use cqlpath_ast::{BinaryOp, IntervalOp, UnaryOp};

/// Function implementation over evaluated, coerced arguments
pub type FunctionImpl =
    Arc<dyn Fn(&[CqlValue], &mut EvaluationContext) -> EvalResult<CqlValue> + Send + Sync>;

/// Extra cost of passing a single value where a list is expected
const SINGLETON_COST: u32 = 5;

static NULL: CqlValue = CqlValue::Null;

/// How a function treats `Null` arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullMode {
    /// Any `Null` argument makes the result `Null`; the implementation is
    /// not called
    PropagateNull,
    /// The implementation receives nulls and decides
    DefinedOnNull,
}

/// Function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<CqlType>,
    /// The last parameter type repeats for any further arguments
    pub variadic: bool,
    pub null_mode: NullMode,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, parameters: Vec<CqlType>, null_mode: NullMode) -> Self {
        Self {
            name: name.into(),
            parameters,
            variadic: false,
            null_mode,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Declared type of the `i`th argument
    pub fn parameter(&self, i: usize) -> Option<&CqlType> {
        self.parameters
            .get(i)
            .or_else(|| self.variadic.then(|| self.parameters.last()).flatten())
    }

    /// Total conversion cost of calling this overload, `None` when it does
    /// not accept the arguments
    pub fn cost(&self, args: &[CqlValue]) -> Option<u32> {
        let arity_ok = if self.variadic {
            args.len() >= self.parameters.len()
        } else {
            args.len() == self.parameters.len()
        };
        if !arity_ok {
            return None;
        }
        args.iter()
            .enumerate()
            .map(|(i, arg)| argument_cost(&arg.get_type(), self.parameter(i)?))
            .sum()
    }
}

fn argument_cost(from: &CqlType, to: &CqlType) -> Option<u32> {
    conversion_cost(from, to).or_else(|| match to {
        CqlType::List(element) if !matches!(from, CqlType::List(_)) => {
            conversion_cost(from, element).map(|c| c + SINGLETON_COST)
        }
        _ => None,
    })
}

fn coerce_argument(value: CqlValue, to: &CqlType) -> EvalResult<CqlValue> {
    let value = match (to, value) {
        (CqlType::List(_), single) if !matches!(single, CqlValue::List(_) | CqlValue::Null) => {
            CqlValue::list(vec![single])
        }
        (_, value) => value,
    };
    Ok(coerce(value, to)?)
}

/// Argument without type information: `null` or a list of nulls
fn is_untyped(value: &CqlValue) -> bool {
    match value {
        CqlValue::Null => true,
        CqlValue::List(list) => list.element_type.is_any(),
        _ => false,
    }
}

/// One registered overload
#[derive(Clone)]
pub struct Overload {
    pub signature: FunctionSignature,
    pub implementation: FunctionImpl,
}

impl std::fmt::Debug for Overload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Registry of built-in functions
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<Overload>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in function
    pub fn standard(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register_string_functions();
        registry.register_math_functions();
        registry.register_list_functions();
        registry.register_aggregate_functions();
        registry.register_datetime_functions();
        registry.register_interval_functions(config.max_expansion_size);
        registry.register_conversion_functions();
        registry.register_clinical_functions();
        registry
    }

    /// Add an overload. Earlier overloads win ties on untyped arguments.
    pub fn register(&mut self, signature: FunctionSignature, implementation: FunctionImpl) {
        self.functions
            .entry(signature.name.to_ascii_lowercase())
            .or_default()
            .push(Overload {
                signature,
                implementation,
            });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_ascii_lowercase())
    }

    pub fn overloads(&self, name: &str) -> &[Overload] {
        self.functions
            .get(&name.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Pick the overload with the lowest conversion cost. A tie is an error
    /// unless an argument is untyped, in which case the first declared
    /// overload is taken.
    pub fn resolve(&self, name: &str, args: &[CqlValue]) -> EvalResult<&Overload> {
        let unresolved = || {
            let types: Vec<CqlType> = args.iter().map(CqlValue::get_type).collect();
            EvalError::unresolved_function(name, &types)
        };
        let mut best: Option<(u32, &Overload)> = None;
        let mut tied = false;
        for overload in self.overloads(name) {
            let Some(cost) = overload.signature.cost(args) else {
                continue;
            };
            match best {
                Some((top, _)) if cost > top => {}
                Some((top, _)) if cost == top => tied = true,
                _ => {
                    best = Some((cost, overload));
                    tied = false;
                }
            }
        }
        match best {
            Some((_, overload)) if !tied || args.iter().any(is_untyped) => Ok(overload),
            _ => Err(unresolved()),
        }
    }

    /// Resolve and call a function
    pub fn invoke(
        &self,
        name: &str,
        args: Vec<CqlValue>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let overload = self.resolve(name, &args)?;
        let signature = &overload.signature;
        if signature.null_mode == NullMode::PropagateNull && args.iter().any(CqlValue::is_null) {
            return Ok(CqlValue::Null);
        }
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| match signature.parameter(i) {
                Some(to) => coerce_argument(arg, to),
                None => Ok(arg),
            })
            .collect::<EvalResult<Vec<_>>>()?;
        (overload.implementation)(&args, ctx)
    }

    // ========================================================================
    // Registration helpers
    // ========================================================================

    fn define<F>(&mut self, name: &str, parameters: Vec<CqlType>, null_mode: NullMode, f: F)
    where
        F: Fn(&[CqlValue], &mut EvaluationContext) -> EvalResult<CqlValue> + Send + Sync + 'static,
    {
        self.register(FunctionSignature::new(name, parameters, null_mode), Arc::new(f));
    }

    fn define_variadic<F>(&mut self, name: &str, parameter: CqlType, null_mode: NullMode, f: F)
    where
        F: Fn(&[CqlValue], &mut EvaluationContext) -> EvalResult<CqlValue> + Send + Sync + 'static,
    {
        self.register(
            FunctionSignature::new(name, vec![parameter], null_mode).variadic(),
            Arc::new(f),
        );
    }

    /// Single-argument function that cannot fail
    fn unary(&mut self, name: &str, parameter: CqlType, f: fn(&CqlValue) -> CqlValue) {
        self.define(name, vec![parameter], NullMode::PropagateNull, move |args, _| {
            Ok(f(arg(args, 0)))
        });
    }

    fn unary_op(&mut self, name: &str, parameter: CqlType, op: UnaryOp) {
        self.define(name, vec![parameter], NullMode::DefinedOnNull, move |args, _| {
            apply_unary(op, arg(args, 0))
        });
    }

    fn binary_op(&mut self, name: &str, parameters: [CqlType; 2], op: BinaryOp) {
        self.define(name, parameters.into(), NullMode::DefinedOnNull, move |args, _| {
            apply_binary(op, arg(args, 0), arg(args, 1))
        });
    }

    fn aggregate(&mut self, name: &str, f: fn(&CqlValue) -> EvalResult<CqlValue>) {
        self.define(name, vec![list_of_any()], NullMode::DefinedOnNull, move |args, _| {
            f(arg(args, 0))
        });
    }

    // ========================================================================
    // String
    // ========================================================================

    fn register_string_functions(&mut self) {
        self.unary("Length", CqlType::String, string::length);
        self.unary("Length", list_of_any(), string::length);
        self.define("Upper", vec![CqlType::String], NullMode::PropagateNull, |args, _| {
            Ok(string::upper(text(args, 0)?))
        });
        self.define("Lower", vec![CqlType::String], NullMode::PropagateNull, |args, _| {
            Ok(string::lower(text(args, 0)?))
        });
        self.define("Trim", vec![CqlType::String], NullMode::PropagateNull, |args, _| {
            Ok(string::trim(text(args, 0)?))
        });
        self.define(
            "Substring",
            vec![CqlType::String, CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(string::substring(text(args, 0)?, int(args, 1)?, None)),
        );
        self.define(
            "Substring",
            vec![CqlType::String, CqlType::Integer, CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(string::substring(text(args, 0)?, int(args, 1)?, Some(int(args, 2)?))),
        );
        self.define(
            "StartsWith",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(string::starts_with(text(args, 0)?, text(args, 1)?)),
        );
        self.define(
            "EndsWith",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(string::ends_with(text(args, 0)?, text(args, 1)?)),
        );
        // FHIRPath substring test
        self.define(
            "Contains",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(CqlValue::Boolean(text(args, 0)?.contains(text(args, 1)?))),
        );
        self.define(
            "Matches",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| string::matches(text(args, 0)?, text(args, 1)?),
        );
        self.define(
            "ReplaceMatches",
            vec![CqlType::String, CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| string::replace_matches(text(args, 0)?, text(args, 1)?, text(args, 2)?),
        );
        self.define(
            "PositionOf",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(string::position_of(text(args, 0)?, text(args, 1)?)),
        );
        self.define(
            "LastPositionOf",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(string::last_position_of(text(args, 0)?, text(args, 1)?)),
        );
        self.define(
            "Split",
            vec![CqlType::String, CqlType::String],
            NullMode::PropagateNull,
            |args, _| Ok(string::split(text(args, 0)?, text(args, 1)?)),
        );
        self.define("Combine", vec![list_of_any()], NullMode::PropagateNull, |args, _| {
            string::combine(arg(args, 0), None)
        });
        self.define(
            "Combine",
            vec![list_of_any(), CqlType::String],
            NullMode::PropagateNull,
            |args, _| string::combine(arg(args, 0), Some(arg(args, 1))),
        );
        self.define_variadic("Concatenate", CqlType::String, NullMode::PropagateNull, |args, _| {
            string::concatenate(args)
        });
        self.define(
            "Indexer",
            vec![CqlType::String, CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(string::indexer(text(args, 0)?, int(args, 1)?)),
        );
    }

    // ========================================================================
    // Math
    // ========================================================================

    fn register_math_functions(&mut self) {
        for t in [CqlType::Integer, CqlType::Long, CqlType::Decimal, CqlType::Quantity] {
            self.unary("Abs", t, arithmetic::abs);
        }
        self.unary("Ceiling", CqlType::Decimal, arithmetic::ceiling);
        self.unary("Floor", CqlType::Decimal, arithmetic::floor);
        self.unary("Truncate", CqlType::Decimal, arithmetic::truncate);
        self.unary("Round", CqlType::Decimal, |v| arithmetic::round(v, 0));
        self.define(
            "Round",
            vec![CqlType::Decimal, CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| {
                let places = u32::try_from(int(args, 1)?).unwrap_or(0);
                Ok(arithmetic::round(arg(args, 0), places))
            },
        );
        self.unary("Ln", CqlType::Decimal, arithmetic::ln);
        self.unary("Exp", CqlType::Decimal, arithmetic::exp);
        self.unary("Sqrt", CqlType::Decimal, arithmetic::sqrt);
        self.define(
            "Log",
            vec![CqlType::Decimal, CqlType::Decimal],
            NullMode::PropagateNull,
            |args, _| Ok(arithmetic::log(arg(args, 0), arg(args, 1))),
        );
        for t in [CqlType::Integer, CqlType::Long, CqlType::Decimal] {
            self.define("Power", vec![t.clone(), t], NullMode::PropagateNull, |args, _| {
                arithmetic::power(arg(args, 0), arg(args, 1))
            });
        }
        self.unary("Successor", CqlType::Any, arithmetic::successor);
        self.unary("Predecessor", CqlType::Any, arithmetic::predecessor);
        self.unary("Precision", CqlType::Any, arithmetic::precision);
    }

    // ========================================================================
    // List
    // ========================================================================

    fn register_list_functions(&mut self) {
        self.define("Exists", vec![list_of_any()], NullMode::DefinedOnNull, |args, _| {
            Ok(list::exists(arg(args, 0)))
        });
        self.define("Empty", vec![list_of_any()], NullMode::DefinedOnNull, |args, _| {
            Ok(list::empty(arg(args, 0)))
        });
        self.unary("First", list_of_any(), list::first);
        self.unary("Last", list_of_any(), list::last);
        self.unary("Tail", list_of_any(), list::tail);
        self.define(
            "Skip",
            vec![list_of_any(), CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(list::skip(arg(args, 0), int(args, 1)?)),
        );
        self.define(
            "Take",
            vec![list_of_any(), CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(list::take(arg(args, 0), int(args, 1)?)),
        );
        self.define(
            "Slice",
            vec![list_of_any(), CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(list::slice(arg(args, 0), int(args, 1)?, None)),
        );
        self.define(
            "Slice",
            vec![list_of_any(), CqlType::Integer, CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(list::slice(arg(args, 0), int(args, 1)?, Some(int(args, 2)?))),
        );
        self.define(
            "IndexOf",
            vec![list_of_any(), CqlType::Any],
            NullMode::DefinedOnNull,
            |args, _| match arg(args, 0) {
                CqlValue::Null => Ok(CqlValue::Null),
                source => Ok(list::index_of(source, arg(args, 1))),
            },
        );
        self.define(
            "Indexer",
            vec![list_of_any(), CqlType::Integer],
            NullMode::PropagateNull,
            |args, _| Ok(list::indexer(arg(args, 0), int(args, 1)?)),
        );
        self.unary("Flatten", list_of_any(), list::flatten);
        self.unary("Distinct", list_of_any(), list::distinct);
        self.unary_op("SingletonFrom", list_of_any(), UnaryOp::SingletonFrom);
        self.unary_op("Single", list_of_any(), UnaryOp::SingletonFrom);
        self.unary_op("Not", CqlType::Boolean, UnaryOp::Not);

        self.binary_op("Contains", [list_of_any(), CqlType::Any], BinaryOp::Contains);
        self.binary_op("Contains", [interval_of_any(), CqlType::Any], BinaryOp::Contains);
        self.binary_op("Contains", [CqlType::Concept, CqlType::Code], BinaryOp::Contains);
        self.binary_op("In", [CqlType::Any, list_of_any()], BinaryOp::In);
        self.binary_op("In", [CqlType::Any, interval_of_any()], BinaryOp::In);
        self.binary_op("In", [CqlType::Code, CqlType::Concept], BinaryOp::In);
        self.define(
            "Includes",
            vec![list_of_any(), list_of_any()],
            NullMode::PropagateNull,
            |args, _| Ok(list::includes(arg(args, 0), arg(args, 1))),
        );
        self.define(
            "Includes",
            vec![interval_of_any(), CqlType::Any],
            NullMode::PropagateNull,
            |args, _| interval::relation(IntervalOp::Includes, arg(args, 0), arg(args, 1), None),
        );
        self.binary_op("Union", [CqlType::Any, CqlType::Any], BinaryOp::Union);
        self.binary_op("Intersect", [CqlType::Any, CqlType::Any], BinaryOp::Intersect);
        self.binary_op("Except", [CqlType::Any, CqlType::Any], BinaryOp::Except);

        self.define_variadic("Coalesce", CqlType::Any, NullMode::DefinedOnNull, |args, _| {
            let candidates = match args {
                [CqlValue::List(only)] => only.elements.as_slice(),
                _ => args,
            };
            Ok(candidates
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(CqlValue::Null))
        });
        self.unary_op("IsNull", CqlType::Any, UnaryOp::IsNull);
        self.unary_op("IsTrue", CqlType::Any, UnaryOp::IsTrue);
        self.unary_op("IsFalse", CqlType::Any, UnaryOp::IsFalse);

        self.define("Children", vec![CqlType::Any], NullMode::PropagateNull, |args, _| {
            let mut found = Vec::new();
            collect_children(arg(args, 0), &mut found, false);
            Ok(CqlValue::list(found))
        });
        self.define("Descendants", vec![CqlType::Any], NullMode::PropagateNull, |args, _| {
            let mut found = Vec::new();
            collect_children(arg(args, 0), &mut found, true);
            Ok(CqlValue::list(found))
        });
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    fn register_aggregate_functions(&mut self) {
        self.aggregate("Count", |v| Ok(aggregate::count(v)));
        self.aggregate("Sum", aggregate::sum);
        self.aggregate("Product", aggregate::product);
        self.aggregate("Min", aggregate::min);
        self.aggregate("Max", aggregate::max);
        self.aggregate("Avg", aggregate::avg);
        self.aggregate("Median", aggregate::median);
        self.aggregate("Mode", |v| Ok(aggregate::mode(v)));
        self.aggregate("GeometricMean", aggregate::geometric_mean);
        self.aggregate("Variance", aggregate::variance);
        self.aggregate("PopulationVariance", aggregate::population_variance);
        self.aggregate("StdDev", aggregate::std_dev);
        self.aggregate("PopulationStdDev", aggregate::population_std_dev);
        self.aggregate("AllTrue", aggregate::all_true);
        self.aggregate("AnyTrue", aggregate::any_true);
    }

    // ========================================================================
    // Date and time
    // ========================================================================

    fn register_datetime_functions(&mut self) {
        self.define("Now", vec![], NullMode::DefinedOnNull, |_, ctx| {
            Ok(CqlValue::DateTime(ctx.now()))
        });
        self.define("Today", vec![], NullMode::DefinedOnNull, |_, ctx| {
            Ok(CqlValue::Date(ctx.today()))
        });
        self.define("TimeOfDay", vec![], NullMode::DefinedOnNull, |_, ctx| {
            Ok(CqlValue::Time(ctx.time_of_day()))
        });
        self.define_variadic("Date", CqlType::Any, NullMode::DefinedOnNull, |args, _| {
            datetime::date(args)
        });
        self.define_variadic("DateTime", CqlType::Any, NullMode::DefinedOnNull, |args, ctx| {
            datetime::datetime(args, ctx.now().timezone_offset.unwrap_or(0))
        });
        self.define_variadic("Time", CqlType::Any, NullMode::DefinedOnNull, |args, _| {
            datetime::time(args)
        });
        self.unary("DateFrom", CqlType::DateTime, datetime::date_from);
        self.unary("TimeFrom", CqlType::DateTime, datetime::time_from);
        self.unary("TimezoneOffsetFrom", CqlType::DateTime, datetime::timezone_offset_from);
    }

    // ========================================================================
    // Intervals
    // ========================================================================

    fn register_interval_functions(&mut self, expansion_limit: usize) {
        self.define("Collapse", vec![list_of_any()], NullMode::PropagateNull, |args, _| {
            match arg(args, 0) {
                CqlValue::List(intervals) => interval::collapse(&intervals.elements),
                _ => Ok(CqlValue::Null),
            }
        });
        self.define("Expand", vec![CqlType::Any], NullMode::DefinedOnNull, move |args, _| {
            interval::expand(arg(args, 0), None, expansion_limit)
        });
        self.define(
            "Expand",
            vec![CqlType::Any, CqlType::Any],
            NullMode::DefinedOnNull,
            move |args, _| {
                let per = Some(arg(args, 1)).filter(|p| !p.is_null());
                interval::expand(arg(args, 0), per, expansion_limit)
            },
        );
        self.unary_op("Start", interval_of_any(), UnaryOp::Start);
        self.unary_op("End", interval_of_any(), UnaryOp::End);
        self.unary_op("Width", interval_of_any(), UnaryOp::Width);
        self.unary_op("Size", interval_of_any(), UnaryOp::Size);
        self.unary_op("PointFrom", interval_of_any(), UnaryOp::PointFrom);
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    fn register_conversion_functions(&mut self) {
        let targets = [
            ("Boolean", CqlType::Boolean),
            ("Integer", CqlType::Integer),
            ("Long", CqlType::Long),
            ("Decimal", CqlType::Decimal),
            ("String", CqlType::String),
            ("Quantity", CqlType::Quantity),
            ("Date", CqlType::Date),
            ("DateTime", CqlType::DateTime),
            ("Time", CqlType::Time),
            ("Concept", CqlType::Concept),
        ];
        for (name, target) in targets {
            let to = target.clone();
            self.define(
                &format!("To{name}"),
                vec![CqlType::Any],
                NullMode::PropagateNull,
                move |args, _| type_ops::convert(arg(args, 0).clone(), &to),
            );
            self.define(
                &format!("ConvertsTo{name}"),
                vec![CqlType::Any],
                NullMode::DefinedOnNull,
                move |args, _| Ok(type_ops::converts(arg(args, 0), &target)),
            );
        }
    }

    // ========================================================================
    // Clinical
    // ========================================================================

    fn register_clinical_functions(&mut self) {
        let units = ["Years", "Months", "Weeks", "Days", "Hours", "Minutes", "Seconds"];
        for plural in units {
            let name = format!("CalculateAgeIn{plural}");
            let Some(unit) = clinical::age_unit(&name) else {
                continue;
            };
            for t in [CqlType::Date, CqlType::DateTime] {
                self.define(&name, vec![t.clone()], NullMode::PropagateNull, move |args, ctx| {
                    clinical::calculate_age(unit, arg(args, 0), ctx)
                });
                self.define(
                    &format!("{name}At"),
                    vec![t.clone(), t],
                    NullMode::PropagateNull,
                    move |args, _| clinical::calculate_age_at(unit, arg(args, 0), arg(args, 1)),
                );
            }
        }
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn list_of_any() -> CqlType {
    CqlType::list(CqlType::Any)
}

fn interval_of_any() -> CqlType {
    CqlType::interval(CqlType::Any)
}

fn arg(args: &[CqlValue], i: usize) -> &CqlValue {
    args.get(i).unwrap_or(&NULL)
}

fn text(args: &[CqlValue], i: usize) -> EvalResult<&str> {
    let value = arg(args, i);
    value
        .as_string()
        .ok_or_else(|| EvalError::incompatible(&value.get_type(), &CqlType::String))
}

fn int(args: &[CqlValue], i: usize) -> EvalResult<i32> {
    let value = arg(args, i);
    value
        .as_integer()
        .ok_or_else(|| EvalError::incompatible(&value.get_type(), &CqlType::Integer))
}

/// Child values of tuples and lists, optionally all the way down
fn collect_children(value: &CqlValue, found: &mut Vec<CqlValue>, recursive: bool) {
    let children: Vec<&CqlValue> = match value {
        CqlValue::Tuple(tuple) => tuple.iter().map(|(_, v)| v).collect(),
        CqlValue::List(items) => {
            for item in items.iter() {
                collect_children(item, found, recursive);
            }
            return;
        }
        _ => return,
    };
    for child in children {
        match child {
            CqlValue::List(items) => found.extend(items.iter().cloned()),
            other => found.push(other.clone()),
        }
        if recursive {
            collect_children(child, found, true);
        }
    }
}
