//! Switch Lowering
//!
//! All case tests run first, in source order, as strict-equality comparisons against
//! the discriminant. The case bodies follow in one fall-through sequence.

use crate::error::{unsupported, LowerResult};
use crate::hir::{Expr, ScopeId, SwitchCase};
use crate::lir::{DynamicOp, LirInstr, ValueStorage};
use crate::lower::control_flow::ControlContext;
use crate::lower::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_switch(
        &mut self,
        scope: Option<ScopeId>,
        discriminant: &Expr,
        cases: &[SwitchCase],
    ) -> LowerResult<()> {
        if self.function.is_resumable()
            && cases
                .iter()
                .filter_map(|case| case.test.as_ref())
                .any(Expr::contains_suspend)
        {
            return unsupported("suspend point inside a switch case test");
        }

        let end = self.new_label();
        let discriminant = self.lower_expr(discriminant)?;
        let discriminant = self.ensure_object(discriminant);

        let pushed = self.enter_block_scope(scope);
        for case in cases {
            self.hoist_function_declarations(&case.body)?;
        }

        let labels: Vec<_> = cases.iter().map(|_| self.new_label()).collect();
        let mut default = None;
        for (case, &label) in cases.iter().zip(&labels) {
            let Some(test) = &case.test else {
                default = Some(label);
                continue;
            };
            let value = self.lower_expr(test)?;
            let value = self.ensure_object(value);
            let matched = self.new_temp(ValueStorage::bool());
            self.emit(LirInstr::BinaryDynamic {
                op: DynamicOp::StrictEq,
                left: discriminant,
                right: value,
                result: matched,
            });
            self.emit(LirInstr::BranchIfTrue {
                condition: matched,
                target: label,
            });
        }
        self.emit(LirInstr::Branch {
            target: default.unwrap_or(end),
        });

        self.control.push(ControlContext::switch_context(end));
        for (case, &label) in cases.iter().zip(&labels) {
            self.place_label(label);
            for stmt in &case.body {
                self.lower_stmt(stmt)?;
            }
        }
        self.control.pop();

        self.place_label(end);
        self.exit_block_scope(pushed);
        Ok(())
    }
}
