//! Evaluation context
//!
//! Everything that varies per run lives here: scopes, parameters, the
//! context subject, the fixed clock, the definition cache and the recursion
//! counter. A context serves one subject at a time and is not shared between
//! threads; the engine itself holds no per-run state.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use cqlpath_ast::Library;
use cqlpath_types::{CqlDate, CqlDateTime, CqlTime, CqlValue};
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::{EvalError, EvalResult};
use crate::provider::DataProvider;

/// Reserved names for FHIRPath iteration variables
pub const THIS: &str = "$this";
pub const INDEX: &str = "$index";
pub const TOTAL: &str = "$total";

/// One frame of bindings: query aliases, lets, function operands or
/// iteration variables
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: SmallVec<[(String, CqlValue); 4]>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind or rebind a name in this frame
    pub fn bind(&mut self, name: impl Into<String>, value: CqlValue) {
        let name = name.into();
        match self.bindings.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: CqlValue) -> Self {
        self.bind(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CqlValue> {
        self.bindings.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CqlValue)> {
        self.bindings.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, CqlValue)> for Scope {
    fn from_iter<I: IntoIterator<Item = (S, CqlValue)>>(iter: I) -> Self {
        let mut scope = Scope::new();
        for (name, value) in iter {
            scope.bind(name, value);
        }
        scope
    }
}

/// State of one definition in the cache
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CacheEntry {
    InProgress,
    Done(CqlValue),
}

/// Evaluation context for one run
pub struct EvaluationContext {
    scopes: Vec<Scope>,
    parameters: IndexMap<String, CqlValue>,
    context_type: Option<String>,
    context_value: Option<CqlValue>,
    clock: DateTime<FixedOffset>,
    depth: usize,
    cache: IndexMap<(String, String), CacheEntry>,
    /// Definitions currently being evaluated, outermost first
    in_progress: Vec<String>,
    provider: Option<Arc<dyn DataProvider>>,
    libraries: IndexMap<String, Arc<Library>>,
    library_stack: Vec<Arc<Library>>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("scopes", &self.scopes.len())
            .field("parameters", &self.parameters)
            .field("context_type", &self.context_type)
            .field("clock", &self.clock)
            .field("depth", &self.depth)
            .field("cached", &self.cache.len())
            .field("libraries", &self.libraries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EvaluationContext {
    /// Empty context with a UTC clock read now
    pub fn new() -> Self {
        EvaluationContextBuilder::new().build()
    }

    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::new()
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    /// Bind a name in the innermost scope, opening one if none exists
    pub fn bind(&mut self, name: impl Into<String>, value: CqlValue) {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.bind(name, value);
        }
    }

    /// Detach every scope so a definition or function body cannot see the
    /// caller's aliases. Pair with [`restore_scopes`](Self::restore_scopes).
    pub(crate) fn take_scopes(&mut self) -> Vec<Scope> {
        std::mem::take(&mut self.scopes)
    }

    pub(crate) fn restore_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes = scopes;
    }

    /// Innermost binding for a name
    pub fn lookup(&self, name: &str) -> Option<&CqlValue> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Current FHIRPath focus: `$this` when iterating, else the subject
    pub fn focus(&self) -> Option<&CqlValue> {
        self.lookup(THIS).or(self.context_value.as_ref())
    }

    // ========================================================================
    // Parameters and subject
    // ========================================================================

    pub fn set_parameter(&mut self, name: impl Into<String>, value: CqlValue) {
        self.parameters.insert(name.into(), value);
    }

    pub fn parameter(&self, name: &str) -> Option<&CqlValue> {
        self.parameters.get(name)
    }

    pub fn context_type(&self) -> Option<&str> {
        self.context_type.as_deref()
    }

    pub fn context_value(&self) -> Option<&CqlValue> {
        self.context_value.as_ref()
    }

    /// Switch to another subject. Cached definition results belong to the
    /// previous subject and are discarded.
    pub fn set_context_value(&mut self, context_type: impl Into<String>, value: CqlValue) {
        self.context_type = Some(context_type.into());
        self.context_value = Some(value);
        self.clear_cache();
    }

    // ========================================================================
    // Clock
    // ========================================================================

    pub fn clock(&self) -> &DateTime<FixedOffset> {
        &self.clock
    }

    /// `Now()`: fixed for the whole run
    pub fn now(&self) -> CqlDateTime {
        CqlDateTime::from_chrono(&self.clock)
    }

    pub fn today(&self) -> CqlDate {
        self.now().date()
    }

    pub fn time_of_day(&self) -> CqlTime {
        self.now()
            .time()
            .unwrap_or_else(|| CqlTime::new(0, 0, 0, 0))
    }

    // ========================================================================
    // Depth guard
    // ========================================================================

    /// Enter one level of evaluation; `StackOverflow` past `limit`
    pub fn enter(&mut self, limit: usize) -> EvalResult<()> {
        if self.depth >= limit {
            return Err(EvalError::stack_overflow(limit));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    // ========================================================================
    // Definition cache
    // ========================================================================

    pub(crate) fn cache_entry(&self, library: &str, name: &str) -> Option<&CacheEntry> {
        self.cache.get(&(library.to_string(), name.to_string()))
    }

    /// Mark a definition as being evaluated. `CircularDefinition` when it
    /// already is.
    pub(crate) fn begin_definition(&mut self, library: &str, name: &str) -> EvalResult<()> {
        let key = qualified(library, name);
        if self.in_progress.contains(&key) {
            let start = self.in_progress.iter().position(|k| *k == key).unwrap_or(0);
            let mut chain: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|k| display_name(k))
                .collect();
            chain.push(display_name(&key));
            return Err(EvalError::circular_definition(&chain));
        }
        self.in_progress.push(key);
        self.cache
            .insert((library.to_string(), name.to_string()), CacheEntry::InProgress);
        Ok(())
    }

    /// Clear the in-progress marker, storing the value when caching
    pub(crate) fn finish_definition(
        &mut self,
        library: &str,
        name: &str,
        value: Option<&CqlValue>,
    ) {
        let key = qualified(library, name);
        if let Some(pos) = self.in_progress.iter().rposition(|k| *k == key) {
            self.in_progress.remove(pos);
        }
        let cache_key = (library.to_string(), name.to_string());
        match value {
            Some(v) => {
                self.cache.insert(cache_key, CacheEntry::Done(v.clone()));
            }
            None => {
                self.cache.shift_remove(&cache_key);
            }
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of completed definitions in the cache
    pub fn cached_count(&self) -> usize {
        self.cache
            .values()
            .filter(|e| matches!(e, CacheEntry::Done(_)))
            .count()
    }

    // ========================================================================
    // Data provider and libraries
    // ========================================================================

    pub fn provider(&self) -> Option<Arc<dyn DataProvider>> {
        self.provider.clone()
    }

    pub fn set_provider(&mut self, provider: Arc<dyn DataProvider>) {
        self.provider = Some(provider);
    }

    /// Register a library so that includes naming it resolve
    pub fn register_library(&mut self, library: Library) -> Arc<Library> {
        let library = Arc::new(library);
        self.libraries
            .insert(library.identifier.id.clone(), Arc::clone(&library));
        library
    }

    pub fn library(&self, id: &str) -> Option<Arc<Library>> {
        self.libraries.get(id).cloned()
    }

    /// Library whose definitions unqualified identifiers refer to
    pub fn current_library(&self) -> Option<Arc<Library>> {
        self.library_stack.last().cloned()
    }

    pub(crate) fn push_library(&mut self, library: Arc<Library>) {
        self.library_stack.push(library);
    }

    pub(crate) fn pop_library(&mut self) {
        self.library_stack.pop();
    }
}

fn qualified(library: &str, name: &str) -> String {
    format!("{library}\u{0}{name}")
}

fn display_name(key: &str) -> String {
    match key.split_once('\u{0}') {
        Some(("", name)) => name.to_string(),
        Some((library, name)) => format!("{library}.{name}"),
        None => key.to_string(),
    }
}

/// Builder for [`EvaluationContext`]
#[derive(Default)]
pub struct EvaluationContextBuilder {
    parameters: IndexMap<String, CqlValue>,
    context: Option<(String, CqlValue)>,
    clock: Option<DateTime<FixedOffset>>,
    timezone_offset: i32,
    provider: Option<Arc<dyn DataProvider>>,
    libraries: Vec<Library>,
}

impl EvaluationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, name: impl Into<String>, value: CqlValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Subject of the run, e.g. (`Patient`, the patient record)
    pub fn context(mut self, context_type: impl Into<String>, value: CqlValue) -> Self {
        self.context = Some((context_type.into(), value));
        self
    }

    /// Fix the clock read by `Now()`, `Today()` and `TimeOfDay()`
    pub fn clock(mut self, clock: DateTime<FixedOffset>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Offset, in minutes, of the clock read when none is fixed
    pub fn timezone_offset(mut self, minutes: i32) -> Self {
        self.timezone_offset = minutes;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Make a library available to includes
    pub fn library(mut self, library: Library) -> Self {
        self.libraries.push(library);
        self
    }

    pub fn build(self) -> EvaluationContext {
        let clock = self.clock.unwrap_or_else(|| {
            let now = Utc::now().fixed_offset();
            match FixedOffset::east_opt(self.timezone_offset.saturating_mul(60)) {
                Some(offset) => now.with_timezone(&offset),
                None => now,
            }
        });

        let context_from_provider = self
            .provider
            .as_ref()
            .and_then(|p| p.current_context())
            .map(|v| ("Patient".to_string(), v));
        let (context_type, context_value) = match self.context.or(context_from_provider) {
            Some((t, v)) => (Some(t), Some(v)),
            None => (None, None),
        };

        let mut ctx = EvaluationContext {
            scopes: Vec::new(),
            parameters: self.parameters,
            context_type,
            context_value,
            clock,
            depth: 0,
            cache: IndexMap::new(),
            in_progress: Vec::new(),
            provider: self.provider,
            libraries: IndexMap::new(),
            library_stack: Vec::new(),
        };
        for library in self.libraries {
            ctx.register_library(library);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scopes_shadow_outer_bindings() {
        let mut ctx = EvaluationContext::new();
        ctx.push_scope(Scope::new().with("X", CqlValue::integer(1)));
        ctx.push_scope(Scope::new().with("X", CqlValue::integer(2)));
        assert_eq!(ctx.lookup("X"), Some(&CqlValue::integer(2)));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("X"), Some(&CqlValue::integer(1)));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("X"), None);
    }

    #[test]
    fn test_depth_guard() {
        let mut ctx = EvaluationContext::new();
        assert!(ctx.enter(2).is_ok());
        assert!(ctx.enter(2).is_ok());
        assert!(matches!(ctx.enter(2), Err(EvalError::StackOverflow { depth: 2 })));
        ctx.exit();
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_reentry_is_circular() {
        let mut ctx = EvaluationContext::new();
        ctx.begin_definition("Lib", "A").unwrap();
        ctx.begin_definition("Lib", "B").unwrap();
        let err = ctx.begin_definition("Lib", "A").unwrap_err();
        assert_eq!(
            err,
            EvalError::CircularDefinition {
                cycle: "Lib.A -> Lib.B -> Lib.A".to_string()
            }
        );
    }

    #[test]
    fn test_context_switch_clears_cache() {
        let mut ctx = EvaluationContext::new();
        ctx.begin_definition("", "A").unwrap();
        ctx.finish_definition("", "A", Some(&CqlValue::integer(1)));
        assert_eq!(ctx.cached_count(), 1);
        ctx.set_context_value("Patient", CqlValue::string("p2"));
        assert_eq!(ctx.cached_count(), 0);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 10, 30, 0)
            .unwrap();
        let ctx = EvaluationContext::builder().clock(clock).build();
        assert_eq!(ctx.today(), CqlDate::new(2024, 6, 15));
        assert_eq!(ctx.now().timezone_offset, Some(60));
        assert_eq!(ctx.time_of_day(), CqlTime::new(10, 30, 0, 0));
    }
}
