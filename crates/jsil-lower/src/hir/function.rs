//! HIR function bodies

use super::expr::{Expr, Pattern};
use super::scope::ScopeId;
use super::stmt::Stmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Module entry point
    Main,
    Function,
    Arrow,
    Constructor,
    Method,
    StaticMethod,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub target: Pattern,
    /// Applied when the argument is `undefined`
    pub default: Option<Expr>,
}

/// Class context of a constructor or method body
#[derive(Debug, Clone)]
pub struct ClassContext {
    pub name: String,
    /// Parent class of a derived class
    pub parent: Option<String>,
}

/// One function body to lower
#[derive(Debug, Clone)]
pub struct HirFunction {
    pub name: String,
    pub kind: FunctionKind,
    /// The function's own scope (the global scope for `Main`)
    pub scope: ScopeId,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_generator: bool,
    pub class: Option<ClassContext>,
}

impl HirFunction {
    pub fn new(name: impl Into<String>, kind: FunctionKind, scope: ScopeId) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
            params: Vec::new(),
            body: Vec::new(),
            is_async: false,
            is_generator: false,
            class: None,
        }
    }

    pub fn is_resumable(&self) -> bool {
        self.is_async || self.is_generator
    }

    /// Constructor of a class with a parent class
    pub fn is_derived_constructor(&self) -> bool {
        self.kind == FunctionKind::Constructor
            && self
                .class
                .as_ref()
                .is_some_and(|class| class.parent.is_some())
    }
}
