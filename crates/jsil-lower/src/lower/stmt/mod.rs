//! Statement Lowering
//!
//! Converts HIR statements to LIR instructions.

mod loops;
mod switch;
mod try_stmt;

use super::bindings::BindMode;
use super::control_flow::ControlContext;
use super::Lowerer;
use crate::error::{unsupported, LowerResult};
use crate::hir::{DeclKind, Declarator, Pattern, Stmt};
use crate::lir::LirInstr;

impl<'a> Lowerer<'a> {
    /// Lower a statement
    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> LowerResult<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::VarDecl { kind, declarators } => self.lower_var_decl(*kind, declarators),
            Stmt::FunctionDecl { binding, function } => {
                if self.hoisted.contains(binding) {
                    return Ok(());
                }
                self.lower_function_declaration(*binding, function)
            }
            Stmt::Block { scope, body } => {
                let pushed = self.enter_block_scope(*scope);
                self.lower_block_body(body)?;
                self.exit_block_scope(pushed);
                Ok(())
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => self.lower_if(test, consequent, alternate.as_deref()),
            Stmt::While { .. }
            | Stmt::DoWhile { .. }
            | Stmt::For { .. }
            | Stmt::ForIn { .. }
            | Stmt::ForOf { .. } => self.lower_loop(stmt, None),
            Stmt::Switch {
                scope,
                discriminant,
                cases,
            } => self.lower_switch(*scope, discriminant, cases),
            Stmt::Labeled { label, body } => self.lower_labeled(label, body),
            Stmt::Break(label) => self.emit_break(label.as_deref()),
            Stmt::Continue(label) => self.emit_continue(label.as_deref()),
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.lower_expr(value)?,
                    None => self.const_undefined(),
                };
                self.emit_return(value)
            }
            Stmt::Throw(value) => {
                let value = self.lower_expr(value)?;
                self.emit_throw(value)
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                if self.function.is_resumable() && stmt.contains_suspend() {
                    self.lower_routed_try(block, handler.as_ref(), finalizer.as_deref())
                } else {
                    self.lower_try(block, handler.as_ref(), finalizer.as_deref())
                }
            }
            Stmt::Empty => Ok(()),
        }
    }

    /// Lower a statement list, hoisting its function declarations
    pub(crate) fn lower_block_body(&mut self, body: &[Stmt]) -> LowerResult<()> {
        self.hoist_function_declarations(body)?;
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn lower_var_decl(&mut self, kind: DeclKind, declarators: &[Declarator]) -> LowerResult<()> {
        for declarator in declarators {
            match (&declarator.init, &declarator.target) {
                (Some(init), target) => {
                    let value = self.lower_expr(init)?;
                    self.bind_pattern(target, value, BindMode::Declare)?;
                }
                // `var x;` keeps the current value
                (None, Pattern::Binding(_)) if kind == DeclKind::Var => {}
                (None, Pattern::Binding(binding)) => {
                    let undefined = self.const_undefined();
                    self.store_binding(*binding, undefined, BindMode::Declare)?;
                }
                (None, _) => return unsupported("destructuring declaration without initializer"),
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        test: &crate::hir::Expr,
        consequent: &Stmt,
        alternate: Option<&Stmt>,
    ) -> LowerResult<()> {
        let end = self.new_label();
        let condition = self.lower_condition(test)?;
        match alternate {
            None => {
                self.emit(LirInstr::BranchIfFalse {
                    condition,
                    target: end,
                });
                self.lower_stmt(consequent)?;
            }
            Some(alternate) => {
                let else_label = self.new_label();
                self.emit(LirInstr::BranchIfFalse {
                    condition,
                    target: else_label,
                });
                self.lower_stmt(consequent)?;
                self.emit(LirInstr::Branch { target: end });
                self.place_label(else_label);
                self.lower_stmt(alternate)?;
            }
        }
        self.place_label(end);
        Ok(())
    }

    fn lower_labeled(&mut self, label: &str, body: &Stmt) -> LowerResult<()> {
        if matches!(
            body,
            Stmt::While { .. }
                | Stmt::DoWhile { .. }
                | Stmt::For { .. }
                | Stmt::ForIn { .. }
                | Stmt::ForOf { .. }
        ) {
            return self.lower_loop(body, Some(label.to_string()));
        }
        let end = self.new_label();
        self.control
            .push(ControlContext::labeled_block(end, label.to_string()));
        self.lower_stmt(body)?;
        self.control.pop();
        self.place_label(end);
        Ok(())
    }
}
