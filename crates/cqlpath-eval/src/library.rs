//! Definition and Library Resolution
//!
//! Named expression definitions are evaluated at most once per run and
//! cached in the context; functions are re-evaluated per call. Both run
//! with the caller's scopes hidden, so a body only sees its own operands.
//! FHIRPath methods that take expression arguments (`where`, `select`, ...)
//! are also handled here since they are resolved by name before the
//! registry.

use std::sync::Arc;

use cqlpath_ast::{Expression, FunctionDefinition, Library, Literal};
use cqlpath_types::{CqlCode, CqlConcept, CqlType, CqlValue, coerce, conversion_cost};
use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::context::{CacheEntry, EvaluationContext, INDEX, Scope, THIS, TOTAL};
use crate::engine::CqlEngine;
use crate::error::{EvalError, EvalResult};
use crate::operators::comparison::same_value;
use crate::operators::type_ops;

impl CqlEngine {
    /// Evaluate one named definition of `library`
    ///
    /// The library is registered with the context on first use, so later
    /// calls share its cached definitions.
    pub fn evaluate_definition(
        &self,
        library: &Library,
        name: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let library = attach(library, ctx);
        self.eval_definition(&library, name, ctx)
    }

    /// Evaluate every expression definition in declaration order
    ///
    /// A failing definition is recorded and the rest still run.
    pub fn evaluate_all(
        &self,
        library: &Library,
        ctx: &mut EvaluationContext,
    ) -> IndexMap<String, EvalResult<CqlValue>> {
        let library = attach(library, ctx);
        let mut results = IndexMap::new();
        for name in library.expression_names() {
            let result = self.eval_definition(&library, name, ctx);
            if let Err(e) = &result {
                warn!("{}.{name} failed: {e}", library.name());
            }
            results.insert(name.to_string(), result);
        }
        results
    }

    /// Cached evaluation of an expression definition
    pub(crate) fn eval_definition(
        &self,
        library: &Arc<Library>,
        name: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let Some(definition) = library.expression_def(name) else {
            return Err(EvalError::undefined_reference(name));
        };
        let id = library.name();
        if let Some(CacheEntry::Done(value)) = ctx.cache_entry(id, name) {
            trace!("{id}.{name} served from cache");
            return Ok(value.clone());
        }
        debug!("evaluating {id}.{name}");
        ctx.begin_definition(id, name)?;

        let saved = ctx.take_scopes();
        ctx.push_library(Arc::clone(library));
        let result = self.evaluate(&definition.expression, ctx);
        ctx.pop_library();
        ctx.restore_scopes(saved);

        let cached = result
            .as_ref()
            .ok()
            .filter(|_| self.config().enable_definition_cache);
        ctx.finish_definition(id, name, cached);
        result
    }

    /// A definition, parameter, code or concept declared in `library`
    pub(crate) fn resolve_library_member(
        &self,
        library: &Arc<Library>,
        name: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Option<CqlValue>> {
        if library.expression_def(name).is_some() {
            return self.eval_definition(library, name, ctx).map(Some);
        }
        if let Some(parameter) = library.parameter(name) {
            if let Some(value) = ctx.parameter(name) {
                return Ok(Some(value.clone()));
            }
            return match &parameter.default {
                Some(default) => {
                    ctx.push_library(Arc::clone(library));
                    let value = self.evaluate(default, ctx);
                    ctx.pop_library();
                    value.map(Some)
                }
                None => Ok(Some(CqlValue::Null)),
            };
        }
        if library.code(name).is_some() {
            return Ok(declared_code(library, name).map(CqlValue::Code));
        }
        if let Some(concept) = library.concept(name) {
            let codes = concept
                .codes
                .iter()
                .filter_map(|code| declared_code(library, code));
            return Ok(Some(CqlValue::Concept(CqlConcept::new(
                codes,
                concept.display.clone(),
            ))));
        }
        Ok(None)
    }

    /// `Alias.Name`: a member of an included library, else a property of an
    /// alias in scope
    #[inline(never)]
    pub(crate) fn eval_qualified_identifier(
        &self,
        qualifier: &str,
        name: &str,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if let Some(library) = included_library(qualifier, ctx) {
            return self
                .resolve_library_member(&library, name, ctx)?
                .ok_or_else(|| EvalError::undefined_reference(format!("{qualifier}.{name}")));
        }
        if let Some(record) = ctx.lookup(qualifier).cloned() {
            return self.navigate(&record, name, ctx);
        }
        Err(EvalError::undefined_reference(format!("{qualifier}.{name}")))
    }

    // ========================================================================
    // Function calls
    // ========================================================================

    #[inline(never)]
    pub(crate) fn eval_function_call(
        &self,
        qualifier: Option<&str>,
        name: &str,
        args: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if qualifier.is_none() {
            if let Some(value) = self.eval_lazy_method(name, None, args, ctx)? {
                return Ok(value);
            }
        }
        let values = self.evaluate_all_of(args, ctx)?;
        self.call_function(qualifier, name, values, ctx)
    }

    /// FHIRPath `source.name(args)`; anything not iterating is
    /// `name(source, args...)`
    #[inline(never)]
    pub(crate) fn eval_invocation(
        &self,
        source: &Expression,
        name: &str,
        args: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if let Some(value) = self.eval_lazy_method(name, Some(source), args, ctx)? {
            return Ok(value);
        }
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(self.evaluate(source, ctx)?);
        for arg in args {
            values.push(self.evaluate(arg, ctx)?);
        }
        self.call_function(None, name, values, ctx)
    }

    /// User functions of the library in scope win over built-ins
    fn call_function(
        &self,
        qualifier: Option<&str>,
        name: &str,
        args: Vec<CqlValue>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let library = match qualifier {
            Some(alias) => Some(
                included_library(alias, ctx)
                    .ok_or_else(|| EvalError::undefined_reference(alias))?,
            ),
            None => ctx.current_library(),
        };
        if let Some(library) = library {
            if let Some(function) = select_function(&library, name, &args) {
                return self.invoke_function(&library, function, args, ctx);
            }
        }
        if qualifier.is_some() {
            let types: Vec<CqlType> = args.iter().map(CqlValue::get_type).collect();
            return Err(EvalError::unresolved_function(name, &types));
        }
        self.registry().invoke(name, args, ctx)
    }

    fn invoke_function(
        &self,
        library: &Arc<Library>,
        function: &FunctionDefinition,
        args: Vec<CqlValue>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let Some(body) = &function.body else {
            // external functions have no body to run
            let types: Vec<CqlType> = args.iter().map(CqlValue::get_type).collect();
            return Err(EvalError::unresolved_function(&function.name, &types));
        };
        debug!("calling {}.{}", library.name(), function.name);
        let operands = function
            .operands
            .iter()
            .zip(args)
            .map(|(operand, value)| {
                let target = CqlType::from_specifier(&operand.type_specifier);
                Ok((operand.name.clone(), bind_operand(value, &target)?))
            })
            .collect::<EvalResult<Scope>>()?;

        let saved = ctx.take_scopes();
        ctx.push_scope(operands);
        ctx.push_library(Arc::clone(library));
        let result = self.evaluate(body, ctx);
        ctx.pop_library();
        ctx.restore_scopes(saved);
        result
    }

    // ========================================================================
    // FHIRPath methods with expression arguments
    // ========================================================================

    /// Methods whose arguments are evaluated per element. `None` when
    /// `name` is not one of them.
    #[inline(never)]
    fn eval_lazy_method(
        &self,
        name: &str,
        source: Option<&Expression>,
        args: &[Expression],
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Option<CqlValue>> {
        let method = name.to_ascii_lowercase();
        if method == "iif" {
            let [condition, then_branch, rest @ ..] = args else {
                return Ok(None);
            };
            if rest.len() > 1 {
                return Ok(None);
            }
            let focus = source.map(|s| self.evaluate(s, ctx)).transpose()?;
            let branch = |engine: &Self, ctx: &mut EvaluationContext| -> EvalResult<CqlValue> {
                let chosen = if engine.evaluate(condition, ctx)?.is_true() {
                    Some(then_branch)
                } else {
                    rest.first()
                };
                chosen.map_or(Ok(CqlValue::Null), |b| engine.evaluate(b, ctx))
            };
            return match focus {
                Some(focus) => self.with_item(&focus, 0, None, ctx, branch),
                None => branch(self, ctx),
            }
            .map(Some);
        }

        let Some(source) = source else {
            return Ok(None);
        };
        let result = match (method.as_str(), args) {
            ("where", [criteria]) => {
                let items = self.evaluate(source, ctx)?.into_elements();
                let mut kept = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    if self
                        .with_item(&item, i, None, ctx, |e, ctx| e.evaluate(criteria, ctx))?
                        .is_true()
                    {
                        kept.push(item);
                    }
                }
                CqlValue::list(kept)
            }
            ("select", [projection]) => {
                let items = self.evaluate(source, ctx)?.into_elements();
                let mut projected = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let value =
                        self.with_item(item, i, None, ctx, |e, ctx| e.evaluate(projection, ctx))?;
                    projected.extend(value.into_elements());
                }
                CqlValue::list(projected)
            }
            ("exists", [criteria]) => {
                let items = self.evaluate(source, ctx)?.into_elements();
                let mut found = false;
                for (i, item) in items.iter().enumerate() {
                    if self
                        .with_item(item, i, None, ctx, |e, ctx| e.evaluate(criteria, ctx))?
                        .is_true()
                    {
                        found = true;
                        break;
                    }
                }
                CqlValue::Boolean(found)
            }
            ("all", [criteria]) => {
                let items = self.evaluate(source, ctx)?.into_elements();
                let mut all = true;
                for (i, item) in items.iter().enumerate() {
                    if !self
                        .with_item(item, i, None, ctx, |e, ctx| e.evaluate(criteria, ctx))?
                        .is_true()
                    {
                        all = false;
                        break;
                    }
                }
                CqlValue::Boolean(all)
            }
            ("repeat", [projection]) => {
                let items = self.evaluate(source, ctx)?.into_elements();
                CqlValue::list(self.repeat(items, projection, ctx)?)
            }
            ("oftype", [type_name]) => {
                let target = type_argument(type_name)?;
                let items = self.evaluate(source, ctx)?.into_elements();
                CqlValue::list(
                    items
                        .into_iter()
                        .filter(|item| type_ops::is_type(item, &target))
                        .collect(),
                )
            }
            ("aggregate", [aggregator, rest @ ..]) if rest.len() <= 1 => {
                let mut total = match rest.first() {
                    Some(init) => self.evaluate(init, ctx)?,
                    None => CqlValue::Null,
                };
                let items = self.evaluate(source, ctx)?.into_elements();
                for (i, item) in items.iter().enumerate() {
                    total = self.with_item(item, i, Some(total), ctx, |e, ctx| {
                        e.evaluate(aggregator, ctx)
                    })?;
                }
                total
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    /// Apply `projection` to the items and to everything it yields until
    /// nothing new appears
    fn repeat(
        &self,
        items: Vec<CqlValue>,
        projection: &Expression,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<CqlValue>> {
        let limit = self.config().max_expansion_size;
        let mut seen: Vec<CqlValue> = Vec::new();
        let mut frontier = items;
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (i, item) in frontier.iter().enumerate() {
                let produced =
                    self.with_item(item, i, None, ctx, |e, ctx| e.evaluate(projection, ctx))?;
                for value in produced.into_elements() {
                    if seen.iter().any(|s| same_value(s, &value)) {
                        continue;
                    }
                    seen.push(value.clone());
                    next.push(value);
                }
            }
            if seen.len() > limit {
                return Err(EvalError::expansion_limit(limit));
            }
            frontier = next;
        }
        Ok(seen)
    }

    /// Run `f` with `$this`, `$index` and optionally `$total` bound
    fn with_item<T>(
        &self,
        item: &CqlValue,
        index: usize,
        total: Option<CqlValue>,
        ctx: &mut EvaluationContext,
        f: impl FnOnce(&Self, &mut EvaluationContext) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        let mut scope = Scope::new()
            .with(THIS, item.clone())
            .with(INDEX, CqlValue::Integer(index));
        if let Some(total) = total {
            scope.bind(TOTAL, total);
        }
        ctx.push_scope(scope);
        let result = f(self, ctx);
        ctx.pop_scope();
        result
    }
}

/// Register `library` unless a library with its id already is
fn attach(library: &Library, ctx: &mut EvaluationContext) -> Arc<Library> {
    match ctx.library(library.name()) {
        Some(registered) => registered,
        None => ctx.register_library(library.clone()),
    }
}

/// Library behind a local include alias (or a registered library id)
fn included_library(alias: &str, ctx: &EvaluationContext) -> Option<Arc<Library>> {
    let path = ctx
        .current_library()
        .and_then(|lib| lib.include(alias).map(|include| include.path.clone()));
    match path {
        Some(path) => ctx.library(&path),
        None => ctx.library(alias),
    }
}

fn declared_code(library: &Library, name: &str) -> Option<CqlCode> {
    let code = library.code(name)?;
    let mut result = match library.codesystem(&code.codesystem) {
        Some(system) => {
            let result = CqlCode::new(code.id.clone(), system.id.clone());
            match &system.version {
                Some(version) => result.with_version(version.clone()),
                None => result,
            }
        }
        None => CqlCode::new(code.id.clone(), code.codesystem.clone()),
    };
    if let Some(display) = &code.display {
        result = result.with_display(display.clone());
    }
    Some(result)
}

/// Same-arity overload with the cheapest operand conversions
fn select_function<'a>(
    library: &'a Library,
    name: &'a str,
    args: &[CqlValue],
) -> Option<&'a FunctionDefinition> {
    library
        .functions(name)
        .filter(|f| f.operands.len() == args.len())
        .filter_map(|f| {
            let cost = f
                .operands
                .iter()
                .zip(args)
                .map(|(operand, value)| {
                    operand_cost(value, &CqlType::from_specifier(&operand.type_specifier))
                })
                .sum::<Option<u32>>()?;
            Some((cost, f))
        })
        .min_by_key(|(cost, _)| *cost)
        .map(|(_, f)| f)
}

fn operand_cost(value: &CqlValue, operand: &CqlType) -> Option<u32> {
    if !value.is_null() && type_ops::is_type(value, operand) {
        return Some(0);
    }
    conversion_cost(&value.get_type(), operand)
}

fn bind_operand(value: CqlValue, operand: &CqlType) -> EvalResult<CqlValue> {
    if value.is_null() || type_ops::is_type(&value, operand) {
        return Ok(value);
    }
    Ok(coerce(value, operand)?)
}

/// Type named by an `ofType` argument
fn type_argument(expr: &Expression) -> EvalResult<CqlType> {
    match expr {
        Expression::Identifier(name) => Ok(CqlType::from_name(None, name)),
        Expression::QualifiedIdentifier { library, name } => {
            Ok(CqlType::from_name(Some(library), name))
        }
        Expression::Literal(Literal::String(name)) => Ok(match name.split_once('.') {
            Some((namespace, local)) => CqlType::from_name(Some(namespace), local),
            None => CqlType::from_name(None, name),
        }),
        _ => Err(EvalError::invalid_argument(
            "ofType",
            "expected a type name argument",
        )),
    }
}
