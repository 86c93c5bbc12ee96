//! Assignment, compound assignment and update expressions

use crate::error::{unsupported, LowerResult};
use crate::hir::{BinaryOp, BindingId, Expr, Pattern, UpdateOp};
use crate::lir::TempId;
use crate::lower::bindings::BindMode;
use crate::lower::Lowerer;

/// A resolved assignment target whose operands are already evaluated
#[derive(Debug, Clone)]
pub(crate) enum AssignTarget {
    Binding(BindingId),
    Property { object: TempId, name: String },
    Item { object: TempId, key: TempId },
}

impl<'a> Lowerer<'a> {
    pub(crate) fn resolve_assign_target(&mut self, target: &Expr) -> LowerResult<AssignTarget> {
        match target {
            Expr::Variable(binding) => Ok(AssignTarget::Binding(*binding)),
            Expr::Member {
                object,
                property,
                optional: false,
            } => {
                let object = self.lower_expr(object)?;
                Ok(AssignTarget::Property {
                    object,
                    name: property.clone(),
                })
            }
            Expr::Index {
                object,
                index,
                optional: false,
            } => {
                self.check_no_suspend([index.as_ref()])?;
                let object = self.lower_expr(object)?;
                let key = self.lower_expr(index)?;
                Ok(AssignTarget::Item { object, key })
            }
            _ => unsupported("invalid assignment target"),
        }
    }

    pub(crate) fn read_target(&mut self, target: &AssignTarget) -> LowerResult<TempId> {
        match target {
            AssignTarget::Binding(binding) => self.load_binding(*binding),
            AssignTarget::Property { object, name } => Ok(self.emit_get_property(*object, name)),
            AssignTarget::Item { object, key } => Ok(self.emit_get_item(*object, *key)),
        }
    }

    pub(crate) fn write_target(&mut self, target: &AssignTarget, value: TempId) -> LowerResult<()> {
        match target {
            AssignTarget::Binding(binding) => {
                self.store_binding(*binding, value, BindMode::Assign)
            }
            AssignTarget::Property { object, name } => {
                self.emit_set_property(*object, name, value);
                Ok(())
            }
            AssignTarget::Item { object, key } => {
                self.emit_set_item(*object, *key, value);
                Ok(())
            }
        }
    }

    pub(crate) fn lower_assign(&mut self, target: &Pattern, value: &Expr) -> LowerResult<TempId> {
        match target {
            Pattern::Binding(binding) => {
                let value = self.lower_expr(value)?;
                self.store_binding(*binding, value, BindMode::Assign)?;
                Ok(value)
            }
            Pattern::Target(expr) => {
                if !matches!(expr.as_ref(), Expr::Variable(_)) {
                    self.check_no_suspend([value])?;
                }
                let target = self.resolve_assign_target(expr)?;
                let value = self.lower_expr(value)?;
                self.write_target(&target, value)?;
                Ok(value)
            }
            pattern => {
                let value = self.lower_expr(value)?;
                self.bind_pattern(pattern, value, BindMode::Assign)?;
                Ok(value)
            }
        }
    }

    pub(crate) fn lower_compound_assign(
        &mut self,
        op: BinaryOp,
        target: &Expr,
        value: &Expr,
    ) -> LowerResult<TempId> {
        self.check_no_suspend([value])?;
        let target = self.resolve_assign_target(target)?;
        let current = self.read_target(&target)?;
        let operand = self.lower_expr(value)?;
        let result = self.apply_binary(op, current, operand);
        self.write_target(&target, result)?;
        Ok(result)
    }

    /// `++x` / `x--`: numeric update; postfix forms yield the old numeric value
    pub(crate) fn lower_update(
        &mut self,
        op: UpdateOp,
        prefix: bool,
        target: &Expr,
    ) -> LowerResult<TempId> {
        let target = self.resolve_assign_target(target)?;
        let current = self.read_target(&target)?;
        let old = self.ensure_number(current);
        let one = self.const_number(1.0);
        let op = match op {
            UpdateOp::Increment => BinaryOp::Add,
            UpdateOp::Decrement => BinaryOp::Sub,
        };
        let updated = self.apply_binary(op, old, one);
        self.write_target(&target, updated)?;
        Ok(if prefix { updated } else { old })
    }
}
