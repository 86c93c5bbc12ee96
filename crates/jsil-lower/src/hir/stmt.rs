//! HIR statements

use super::expr::{Expr, FunctionRef, Pattern};
use super::scope::{BindingId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
}

/// Left side of a `for-in` / `for-of` head
#[derive(Debug, Clone)]
pub struct ForTarget {
    pub pattern: Pattern,
    /// Declaration kind when the head declares (`for (const x of ...)`)
    pub declaration: Option<DeclKind>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for the default clause
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    /// Scope of the catch parameter and body
    pub scope: Option<ScopeId>,
    pub param: Option<Pattern>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    VarDecl {
        kind: DeclKind,
        declarators: Vec<Declarator>,
    },
    FunctionDecl {
        binding: BindingId,
        function: FunctionRef,
    },
    Block {
        scope: Option<ScopeId>,
        body: Vec<Stmt>,
    },
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    For {
        /// Scope of the loop head declarations
        scope: Option<ScopeId>,
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        scope: Option<ScopeId>,
        target: ForTarget,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        scope: Option<ScopeId>,
        target: ForTarget,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Switch {
        scope: Option<ScopeId>,
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Empty,
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn block(body: Vec<Stmt>) -> Self {
        Stmt::Block { scope: None, body }
    }

    pub fn let_decl(binding: BindingId, init: Expr) -> Self {
        Stmt::VarDecl {
            kind: DeclKind::Let,
            declarators: vec![Declarator {
                target: Pattern::Binding(binding),
                init: Some(init),
            }],
        }
    }

    pub fn const_decl(binding: BindingId, init: Expr) -> Self {
        Stmt::VarDecl {
            kind: DeclKind::Const,
            declarators: vec![Declarator {
                target: Pattern::Binding(binding),
                init: Some(init),
            }],
        }
    }

    /// Executing the statement may suspend the enclosing function.
    /// Nested functions are opaque.
    pub fn contains_suspend(&self) -> bool {
        match self {
            Stmt::Expr(expr) | Stmt::Throw(expr) => expr.contains_suspend(),
            Stmt::VarDecl { declarators, .. } => declarators.iter().any(|declarator| {
                declarator
                    .init
                    .as_ref()
                    .is_some_and(|init| init.contains_suspend())
            }),
            Stmt::FunctionDecl { .. } | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => false,
            Stmt::Block { body, .. } => stmts_contain_suspend(body),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                test.contains_suspend()
                    || consequent.contains_suspend()
                    || alternate.as_ref().is_some_and(|alt| alt.contains_suspend())
            }
            Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
                test.contains_suspend() || body.contains_suspend()
            }
            Stmt::For {
                init,
                test,
                update,
                body,
                ..
            } => {
                init.as_ref().is_some_and(|init| init.contains_suspend())
                    || test.as_ref().is_some_and(Expr::contains_suspend)
                    || update.as_ref().is_some_and(Expr::contains_suspend)
                    || body.contains_suspend()
            }
            Stmt::ForIn { object, body, .. } => object.contains_suspend() || body.contains_suspend(),
            Stmt::ForOf { iterable, body, .. } => {
                iterable.contains_suspend() || body.contains_suspend()
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                discriminant.contains_suspend()
                    || cases.iter().any(|case| {
                        case.test.as_ref().is_some_and(Expr::contains_suspend)
                            || stmts_contain_suspend(&case.body)
                    })
            }
            Stmt::Labeled { body, .. } => body.contains_suspend(),
            Stmt::Return(value) => value.as_ref().is_some_and(Expr::contains_suspend),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                stmts_contain_suspend(block)
                    || handler
                        .as_ref()
                        .is_some_and(|handler| stmts_contain_suspend(&handler.body))
                    || finalizer
                        .as_ref()
                        .is_some_and(|finalizer| stmts_contain_suspend(finalizer))
            }
        }
    }
}

pub fn stmts_contain_suspend(stmts: &[Stmt]) -> bool {
    stmts.iter().any(Stmt::contains_suspend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_with_await_in_finally() {
        let stmt = Stmt::Try {
            block: vec![Stmt::Empty],
            handler: None,
            finalizer: Some(vec![Stmt::Expr(Expr::Await(Box::new(Expr::Null)))]),
        };
        assert!(stmt.contains_suspend());
    }

    #[test]
    fn test_plain_loop_has_no_suspend() {
        let stmt = Stmt::While {
            test: Expr::Bool(true),
            body: Box::new(Stmt::Break(None)),
        };
        assert!(!stmt.contains_suspend());
    }
}
