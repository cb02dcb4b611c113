//! Query and retrieve nodes

use crate::{BoxExpr, Expression, OptBoxExpr};

/// A query expression
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sources: Vec<QuerySource>,
    pub lets: Vec<LetClause>,
    /// `with` / `without` clauses
    pub relationships: Vec<RelationshipClause>,
    pub where_clause: OptBoxExpr,
    pub return_clause: Option<ReturnClause>,
    pub aggregate_clause: Option<AggregateClause>,
    pub sort_clause: Option<SortClause>,
}

impl Query {
    /// Create a new query with a single source
    pub fn new(source: QuerySource) -> Self {
        Self::multi(vec![source])
    }

    /// Create a new multi-source query
    pub fn multi(sources: Vec<QuerySource>) -> Self {
        Self {
            sources,
            lets: Vec::new(),
            relationships: Vec::new(),
            where_clause: None,
            return_clause: None,
            aggregate_clause: None,
            sort_clause: None,
        }
    }

    pub fn with_let(mut self, identifier: impl Into<String>, expression: Expression) -> Self {
        self.lets.push(LetClause {
            identifier: identifier.into(),
            expression: Box::new(expression),
        });
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipClause) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_where(mut self, condition: Expression) -> Self {
        self.where_clause = Some(Box::new(condition));
        self
    }

    pub fn with_return(mut self, expression: Expression, all: bool) -> Self {
        self.return_clause = Some(ReturnClause {
            all,
            expression: Box::new(expression),
        });
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateClause) -> Self {
        self.aggregate_clause = Some(aggregate);
        self
    }

    pub fn with_sort(mut self, items: Vec<SortItem>) -> Self {
        self.sort_clause = Some(SortClause { items });
        self
    }
}

/// A source in a query (`[Encounter] E`, `({1, 2}) X`)
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySource {
    pub expression: BoxExpr,
    pub alias: String,
}

impl QuerySource {
    pub fn new(expression: Expression, alias: impl Into<String>) -> Self {
        Self {
            expression: Box::new(expression),
            alias: alias.into(),
        }
    }
}

/// `let identifier: expression`
#[derive(Debug, Clone, PartialEq)]
pub struct LetClause {
    pub identifier: String,
    pub expression: BoxExpr,
}

/// `with Source Alias such that condition`
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipClause {
    pub kind: RelationshipKind,
    pub source: QuerySource,
    pub such_that: BoxExpr,
}

impl RelationshipClause {
    pub fn with(source: QuerySource, such_that: Expression) -> Self {
        Self {
            kind: RelationshipKind::With,
            source,
            such_that: Box::new(such_that),
        }
    }

    pub fn without(source: QuerySource, such_that: Expression) -> Self {
        Self {
            kind: RelationshipKind::Without,
            source,
            such_that: Box::new(such_that),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    With,
    Without,
}

/// `return [all|distinct] expression`. Distinct unless `all`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub all: bool,
    pub expression: BoxExpr,
}

/// `aggregate [all|distinct] Acc starting init: expression`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateClause {
    pub identifier: String,
    pub distinct: bool,
    pub starting: OptBoxExpr,
    pub expression: BoxExpr,
}

impl AggregateClause {
    pub fn new(
        identifier: impl Into<String>,
        starting: Option<Expression>,
        expression: Expression,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            distinct: false,
            starting: starting.map(Box::new),
            expression: Box::new(expression),
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub items: Vec<SortItem>,
}

/// A sort key. Without an expression the element itself is the key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub direction: SortDirection,
    pub expression: OptBoxExpr,
}

impl SortItem {
    pub fn element(direction: SortDirection) -> Self {
        Self {
            direction,
            expression: None,
        }
    }

    pub fn by(expression: Expression, direction: SortDirection) -> Self {
        Self {
            direction,
            expression: Some(Box::new(expression)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Retrieve expression (`[Condition: "Diabetes codes"]`)
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieve {
    /// Resource type name, without model qualifier
    pub data_type: String,
    /// Property holding the codes to filter on (`code` when omitted)
    pub code_path: Option<String>,
    /// Code, Concept or list of codes to filter by
    pub codes: OptBoxExpr,
}

impl Retrieve {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            code_path: None,
            codes: None,
        }
    }

    pub fn with_codes(mut self, code_path: Option<String>, codes: Expression) -> Self {
        self.code_path = code_path;
        self.codes = Some(Box::new(codes));
        self
    }
}
