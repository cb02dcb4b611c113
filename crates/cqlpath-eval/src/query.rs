//! Query Evaluation
//!
//! This module implements CQL query evaluation:
//! - Single-source queries (list or singleton)
//! - Multi-source queries (cartesian product)
//! - Let clauses
//! - With/Without relationship clauses
//! - Where filtering
//! - Return projection, distinct unless `all`
//! - Sort (element or `by` expressions, multi-key)
//! - Aggregate clause
//!
//! Retrieve expressions live here as well since they are the usual query
//! sources.

use std::cmp::Ordering;

use cqlpath_ast::{
    AggregateClause, Query, RelationshipClause, RelationshipKind, Retrieve, SortClause,
    SortDirection,
};
use cqlpath_types::{CqlTuple, CqlValue};
use log::{debug, trace};

use crate::context::{EvaluationContext, Scope, THIS};
use crate::engine::CqlEngine;
use crate::error::{EvalError, EvalResult};
use crate::operators::comparison::{compare, same_value};
use crate::operators::list;
use crate::provider::{RetrieveRequest, extract_codes};

impl CqlEngine {
    /// Evaluate a Query expression
    ///
    /// Rows are bound alias by alias; each row then runs through let, with/
    /// without and where before projection. An aggregate clause replaces
    /// projection and sorting with a fold over the surviving rows.
    #[inline(never)]
    pub(crate) fn eval_query(
        &self,
        query: &Query,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        // Step 1: evaluate sources
        let mut singular = true;
        let mut sources = Vec::with_capacity(query.sources.len());
        for source in &query.sources {
            let items = match self.evaluate(&source.expression, ctx)? {
                CqlValue::List(list) => {
                    singular = false;
                    list.elements
                }
                other => other.into_elements(),
            };
            sources.push((source.alias.as_str(), items));
        }

        // Step 2: generate combinations
        let rows = combinations(&sources);
        trace!("query over {} row(s)", rows.len());

        // Step 3: let, relationships and where
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(row) = self.filter_row(query, row, ctx)? {
                kept.push(row);
            }
        }

        if let Some(aggregate) = &query.aggregate_clause {
            return self.apply_aggregate_clause(aggregate, kept, ctx);
        }

        // Step 4: return
        let mut results = Vec::with_capacity(kept.len());
        for row in kept {
            results.push(self.apply_return_clause(query, row, ctx)?);
        }
        if query.return_clause.as_ref().is_some_and(|r| !r.all) {
            results = list::distinct(&CqlValue::list(results)).into_elements();
        }

        // Step 5: sort
        if let Some(sort) = &query.sort_clause {
            results = self.apply_sort_clause(sort, results, ctx)?;
        }

        if singular {
            return Ok(results.into_iter().next().unwrap_or(CqlValue::Null));
        }
        Ok(CqlValue::list(results))
    }

    /// The row with its lets bound, or `None` when a clause rejects it
    fn filter_row(
        &self,
        query: &Query,
        row: Scope,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Option<Scope>> {
        ctx.push_scope(row);
        let outcome = self.row_passes(query, ctx);
        let row = ctx.pop_scope().unwrap_or_default();
        Ok(outcome?.then_some(row))
    }

    fn row_passes(&self, query: &Query, ctx: &mut EvaluationContext) -> EvalResult<bool> {
        for binding in &query.lets {
            let value = self.evaluate(&binding.expression, ctx)?;
            ctx.bind(binding.identifier.clone(), value);
        }
        for relationship in &query.relationships {
            if !self.apply_relationship(relationship, ctx)? {
                return Ok(false);
            }
        }
        match &query.where_clause {
            // only `true` keeps the row
            Some(condition) => Ok(self.evaluate(condition, ctx)?.is_true()),
            None => Ok(true),
        }
    }

    /// `with` holds when some related element satisfies `such that`;
    /// `without` when none does
    fn apply_relationship(
        &self,
        relationship: &RelationshipClause,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<bool> {
        let related = self
            .evaluate(&relationship.source.expression, ctx)?
            .into_elements();
        let mut found = false;
        for element in related {
            ctx.push_scope(Scope::new().with(relationship.source.alias.clone(), element));
            let matched = self.evaluate(&relationship.such_that, ctx);
            ctx.pop_scope();
            if matched?.is_true() {
                found = true;
                break;
            }
        }
        Ok(match relationship.kind {
            RelationshipKind::With => found,
            RelationshipKind::Without => !found,
        })
    }

    fn apply_return_clause(
        &self,
        query: &Query,
        row: Scope,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        if let Some(clause) = &query.return_clause {
            ctx.push_scope(row);
            let value = self.evaluate(&clause.expression, ctx);
            ctx.pop_scope();
            return value;
        }
        let alias_value = |alias: &str| row.get(alias).cloned().unwrap_or(CqlValue::Null);
        match query.sources.as_slice() {
            [source] => Ok(alias_value(&source.alias)),
            sources => Ok(CqlValue::Tuple(CqlTuple::from_elements(
                sources
                    .iter()
                    .map(|s| (s.alias.clone(), alias_value(&s.alias))),
            ))),
        }
    }

    /// Fold the rows into the accumulator, seeded by `starting`
    fn apply_aggregate_clause(
        &self,
        clause: &AggregateClause,
        rows: Vec<Scope>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let mut accumulator = match &clause.starting {
            Some(init) => self.evaluate(init, ctx)?,
            None => CqlValue::Null,
        };
        let rows = if clause.distinct {
            distinct_rows(rows)
        } else {
            rows
        };
        for row in rows {
            ctx.push_scope(row.with(clause.identifier.clone(), accumulator));
            let next = self.evaluate(&clause.expression, ctx);
            ctx.pop_scope();
            accumulator = next?;
        }
        Ok(accumulator)
    }

    /// Stable multi-key sort; `Null` keys come first in either direction
    fn apply_sort_clause(
        &self,
        clause: &SortClause,
        results: Vec<CqlValue>,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<Vec<CqlValue>> {
        let mut keyed = Vec::with_capacity(results.len());
        for value in results {
            let mut keys = Vec::with_capacity(clause.items.len());
            for item in &clause.items {
                let key = match &item.expression {
                    Some(expr) => {
                        ctx.push_scope(sort_scope(&value));
                        let key = self.evaluate(expr, ctx);
                        ctx.pop_scope();
                        key?
                    }
                    None => value.clone(),
                };
                keys.push(key);
            }
            keyed.push((keys, value));
        }

        let mut failure: Option<EvalError> = None;
        keyed.sort_by(|(a, _), (b, _)| {
            for ((x, y), item) in a.iter().zip(b).zip(&clause.items) {
                let ordering = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => match compare(x, y) {
                        Ok(Some(ordering)) => match item.direction {
                            SortDirection::Ascending => ordering,
                            SortDirection::Descending => ordering.reverse(),
                        },
                        Ok(None) => Ordering::Equal,
                        Err(e) => {
                            failure.get_or_insert(e);
                            Ordering::Equal
                        }
                    },
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(keyed.into_iter().map(|(_, value)| value).collect())
    }

    /// Evaluate a Retrieve through the data provider
    ///
    /// Without a provider there is no data, so the result is empty.
    #[inline(never)]
    pub(crate) fn eval_retrieve(
        &self,
        retrieve: &Retrieve,
        ctx: &mut EvaluationContext,
    ) -> EvalResult<CqlValue> {
        let Some(provider) = ctx.provider() else {
            debug!("no data provider; [{}] is empty", retrieve.data_type);
            return Ok(CqlValue::list(Vec::new()));
        };
        let mut request = RetrieveRequest::new(retrieve.data_type.clone());
        if let Some(codes) = &retrieve.codes {
            let codes = self.evaluate(codes, ctx)?;
            request = request.with_codes(retrieve.code_path.clone(), extract_codes(&codes));
        }
        if let Some(context_type) = ctx.context_type() {
            request = request.with_context(context_type);
        }
        debug!("retrieve {request:?}");
        let records = provider.retrieve(&request)?;
        trace!("[{}] returned {} record(s)", retrieve.data_type, records.len());
        Ok(CqlValue::list(records))
    }
}

/// Cartesian product of the sources, rightmost varying fastest
fn combinations(sources: &[(&str, Vec<CqlValue>)]) -> Vec<Scope> {
    let mut rows = vec![Scope::new()];
    for (alias, items) in sources {
        let mut next = Vec::with_capacity(rows.len() * items.len());
        for row in &rows {
            for item in items {
                next.push(row.clone().with(*alias, item.clone()));
            }
        }
        rows = next;
    }
    rows
}

fn distinct_rows(rows: Vec<Scope>) -> Vec<Scope> {
    let mut kept: Vec<Scope> = Vec::with_capacity(rows.len());
    for row in rows {
        let duplicate = kept.iter().any(|k| {
            k.iter()
                .zip(row.iter())
                .all(|((_, a), (_, b))| same_value(a, b))
        });
        if !duplicate {
            kept.push(row);
        }
    }
    kept
}

/// `$this` is the element; tuple fields are visible by name
fn sort_scope(value: &CqlValue) -> Scope {
    let mut scope = Scope::new().with(THIS, value.clone());
    if let CqlValue::Tuple(tuple) = value {
        for (name, field) in tuple.iter() {
            scope.bind(name.clone(), field.clone());
        }
    }
    scope
}
