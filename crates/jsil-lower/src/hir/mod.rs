//! High-level Intermediate Representation (HIR)
//!
//! The input of lowering: a resolved statement/expression tree whose identifiers are
//! bindings, a lexical scope tree carrying capture analysis, and the user class registry.
//! Produced by the front-end; lowering only reads it.

pub mod expr;
pub mod function;
pub mod registry;
pub mod scope;
pub mod stmt;

pub use expr::{
    Argument, ArrayElement, BinaryOp, Expr, FunctionRef, LogicalOp, NewCallee, ObjectMember,
    Pattern, PropertyKey, UnaryOp, UpdateOp,
};
pub use function::{ClassContext, FunctionKind, HirFunction, Param};
pub use registry::{ClassInfo, ClassRegistry, FieldInfo, MethodInfo};
pub use scope::{Binding, BindingId, BindingKind, Scope, ScopeId, ScopeKind, ScopeTree};
pub use stmt::{CatchClause, DeclKind, Declarator, ForTarget, Stmt, SwitchCase};
