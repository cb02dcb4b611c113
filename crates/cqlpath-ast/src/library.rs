//! Library and definition shapes
//!
//! A `Library` is supplied once per compiled library: its parameters,
//! terminology declarations, includes and named statements.

use crate::{Expression, TypeSpecifier};

/// A compiled library
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Library {
    pub identifier: VersionedIdentifier,
    pub includes: Vec<IncludeDefinition>,
    pub parameters: Vec<ParameterDefinition>,
    pub codesystems: Vec<CodesystemDefinition>,
    pub codes: Vec<CodeDefinition>,
    pub concepts: Vec<ConceptDefinition>,
    pub statements: Vec<Statement>,
}

impl Library {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            identifier: VersionedIdentifier {
                id: id.into(),
                version: None,
            },
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.identifier.id
    }

    /// Add an expression definition
    pub fn define(mut self, name: impl Into<String>, expression: Expression) -> Self {
        self.statements
            .push(Statement::ExpressionDef(ExpressionDefinition {
                name: name.into(),
                expression,
            }));
        self
    }

    /// Add a function definition
    pub fn define_function(mut self, function: FunctionDefinition) -> Self {
        self.statements.push(Statement::FunctionDef(function));
        self
    }

    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        default: Option<Expression>,
    ) -> Self {
        self.parameters.push(ParameterDefinition {
            name: name.into(),
            type_specifier: None,
            default,
        });
        self
    }

    /// Include another library under a local alias
    pub fn with_include(mut self, path: impl Into<String>, alias: impl Into<String>) -> Self {
        self.includes.push(IncludeDefinition {
            path: path.into(),
            version: None,
            alias: alias.into(),
        });
        self
    }

    pub fn with_codesystem(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.codesystems.push(CodesystemDefinition {
            name: name.into(),
            id: id.into(),
            version: None,
        });
        self
    }

    pub fn with_code(mut self, code: CodeDefinition) -> Self {
        self.codes.push(code);
        self
    }

    pub fn with_concept(mut self, concept: ConceptDefinition) -> Self {
        self.concepts.push(concept);
        self
    }

    /// Find a named expression definition
    pub fn expression_def(&self, name: &str) -> Option<&ExpressionDefinition> {
        self.statements.iter().find_map(|s| match s {
            Statement::ExpressionDef(def) if def.name == name => Some(def),
            _ => None,
        })
    }

    /// All function definitions with the given name (overloads)
    pub fn functions<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FunctionDefinition> {
        self.statements.iter().filter_map(move |s| match s {
            Statement::FunctionDef(def) if def.name == name => Some(def),
            _ => None,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn codesystem(&self, name: &str) -> Option<&CodesystemDefinition> {
        self.codesystems.iter().find(|c| c.name == name)
    }

    pub fn code(&self, name: &str) -> Option<&CodeDefinition> {
        self.codes.iter().find(|c| c.name == name)
    }

    pub fn concept(&self, name: &str) -> Option<&ConceptDefinition> {
        self.concepts.iter().find(|c| c.name == name)
    }

    /// Resolve a local include alias to the included library path
    pub fn include(&self, alias: &str) -> Option<&IncludeDefinition> {
        self.includes.iter().find(|i| i.alias == alias)
    }

    /// Names of expression definitions in declaration order
    pub fn expression_names(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().filter_map(|s| match s {
            Statement::ExpressionDef(def) => Some(def.name.as_str()),
            Statement::FunctionDef(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionedIdentifier {
    pub id: String,
    pub version: Option<String>,
}

/// `include Common version '1.0' called C`
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDefinition {
    pub path: String,
    pub version: Option<String>,
    pub alias: String,
}

/// `parameter "Measurement Period" Interval<DateTime> default ...`
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub type_specifier: Option<TypeSpecifier>,
    pub default: Option<Expression>,
}

/// `codesystem "LOINC": 'http://loinc.org'`
#[derive(Debug, Clone, PartialEq)]
pub struct CodesystemDefinition {
    pub name: String,
    pub id: String,
    pub version: Option<String>,
}

/// `code "Glucose": '2345-7' from "LOINC" display 'Glucose'`
#[derive(Debug, Clone, PartialEq)]
pub struct CodeDefinition {
    pub name: String,
    pub id: String,
    /// Name of the declaring codesystem
    pub codesystem: String,
    pub display: Option<String>,
}

/// `concept "Diabetes": { "Code A", "Code B" } display 'Diabetes'`
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptDefinition {
    pub name: String,
    /// Names of code declarations
    pub codes: Vec<String>,
    pub display: Option<String>,
}

/// A statement in the library
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    ExpressionDef(ExpressionDefinition),
    FunctionDef(FunctionDefinition),
}

/// `define "Name": expression`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionDefinition {
    pub name: String,
    pub expression: Expression,
}

/// `define [fluent] function Name(operands) returns T: body`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub fluent: bool,
    pub operands: Vec<FunctionOperand>,
    pub return_type: Option<TypeSpecifier>,
    /// `None` for external functions
    pub body: Option<Expression>,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, operands: Vec<FunctionOperand>, body: Expression) -> Self {
        Self {
            name: name.into(),
            fluent: false,
            operands,
            return_type: None,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOperand {
    pub name: String,
    pub type_specifier: TypeSpecifier,
}

impl FunctionOperand {
    pub fn new(name: impl Into<String>, type_specifier: TypeSpecifier) -> Self {
        Self {
            name: name.into(),
            type_specifier,
        }
    }
}
