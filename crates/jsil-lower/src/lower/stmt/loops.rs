//! Loop Lowering
//!
//! `while`, `do-while`, `for`, `for-in` and `for-of`. Loop state that must survive a
//! suspend point inside the body lives in durable carriers.

use crate::error::{unsupported, LowerResult};
use crate::hir::{Expr, ForTarget, ScopeId, Stmt};
use crate::lir::{
    CompareOp, ExceptionRegion, LabelId, LirInstr, NumericOp, RegionKind, RuntimeHelper, TempId,
    ValueStorage, ValueType,
};
use crate::lower::bindings::BindMode;
use crate::lower::control_flow::ControlContext;
use crate::lower::{Carrier, Lowerer};

impl<'a> Lowerer<'a> {
    /// Lower a loop statement; `label` names it for labeled break/continue
    pub(crate) fn lower_loop(&mut self, stmt: &Stmt, label: Option<String>) -> LowerResult<()> {
        match stmt {
            Stmt::While { test, body } => self.lower_while(test, body, label),
            Stmt::DoWhile { body, test } => self.lower_do_while(body, test, label),
            Stmt::For {
                scope,
                init,
                test,
                update,
                body,
            } => self.lower_for(
                *scope,
                init.as_deref(),
                test.as_ref(),
                update.as_ref(),
                body,
                label,
            ),
            Stmt::ForIn {
                scope,
                target,
                object,
                body,
            } => self.lower_for_in(*scope, target, object, body, label),
            Stmt::ForOf {
                scope,
                target,
                iterable,
                body,
            } => {
                if self.function.is_resumable() && body.contains_suspend() {
                    self.lower_for_of_resumable(*scope, target, iterable, body, label)
                } else {
                    self.lower_for_of(*scope, target, iterable, body, label)
                }
            }
            _ => unsupported("not a loop statement"),
        }
    }

    /// Lower a loop body with its break/continue targets active
    fn lower_loop_body(
        &mut self,
        body: &Stmt,
        break_label: LabelId,
        continue_label: LabelId,
        label: Option<String>,
    ) -> LowerResult<()> {
        self.control
            .push(ControlContext::loop_context(break_label, continue_label, label));
        self.lower_stmt(body)?;
        self.control.pop();
        Ok(())
    }

    fn lower_while(&mut self, test: &Expr, body: &Stmt, label: Option<String>) -> LowerResult<()> {
        let head = self.new_label();
        let end = self.new_label();

        self.place_label(head);
        let condition = self.lower_condition(test)?;
        self.emit(LirInstr::BranchIfFalse {
            condition,
            target: end,
        });
        self.lower_loop_body(body, end, head, label)?;
        self.emit(LirInstr::Branch { target: head });
        self.place_label(end);
        Ok(())
    }

    fn lower_do_while(
        &mut self,
        body: &Stmt,
        test: &Expr,
        label: Option<String>,
    ) -> LowerResult<()> {
        let top = self.new_label();
        let next = self.new_label();
        let end = self.new_label();

        self.place_label(top);
        self.lower_loop_body(body, end, next, label)?;
        self.place_label(next);
        let condition = self.lower_condition(test)?;
        self.emit(LirInstr::BranchIfTrue {
            condition,
            target: top,
        });
        self.place_label(end);
        Ok(())
    }

    fn lower_for(
        &mut self,
        scope: Option<ScopeId>,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        label: Option<String>,
    ) -> LowerResult<()> {
        let head = self.new_label();
        let next = self.new_label();
        let end = self.new_label();

        let pushed = self.enter_block_scope(scope);
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }

        self.place_label(head);
        if let Some(test) = test {
            let condition = self.lower_condition(test)?;
            self.emit(LirInstr::BranchIfFalse {
                condition,
                target: end,
            });
        }
        self.lower_loop_body(body, end, next, label)?;

        self.place_label(next);
        // each iteration closes over its own copy of the head bindings
        if let (true, Some(scope)) = (pushed, scope) {
            self.renew_block_scope(scope, true)?;
        }
        if let Some(update) = update {
            self.lower_expr(update)?;
        }
        self.emit(LirInstr::Branch { target: head });
        self.place_label(end);
        self.exit_block_scope(pushed);
        Ok(())
    }

    /// Bind the per-iteration value to the loop head target inside a fresh
    /// capture object
    fn bind_for_target(
        &mut self,
        scope: Option<ScopeId>,
        target: &ForTarget,
        value: TempId,
    ) -> LowerResult<bool> {
        let pushed = self.enter_block_scope(scope);
        let mode = if target.declaration.is_some() {
            BindMode::Declare
        } else {
            BindMode::Assign
        };
        self.bind_pattern(&target.pattern, value, mode)?;
        Ok(pushed)
    }

    fn lower_for_in(
        &mut self,
        scope: Option<ScopeId>,
        target: &ForTarget,
        object: &Expr,
        body: &Stmt,
        label: Option<String>,
    ) -> LowerResult<()> {
        let head = self.new_label();
        let next = self.new_label();
        let end = self.new_label();

        let object = self.lower_expr(object)?;
        let object = self.ensure_object(object);
        let array = ValueStorage::reference(ValueType::Array);
        let keys = self.new_temp(array.clone());
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::EnumerateKeys,
            args: vec![object],
            result: keys,
        });
        let length = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::GetLength {
            object: keys,
            result: length,
        });

        let keys_carrier = self.durable_carrier("forInKeys", array);
        let length_carrier = self.durable_carrier("forInLength", ValueStorage::double());
        let index_carrier = self.durable_carrier("forInIndex", ValueStorage::double());
        self.store_carrier(&keys_carrier, keys);
        self.store_carrier(&length_carrier, length);
        let zero = self.const_number(0.0);
        self.store_carrier(&index_carrier, zero);

        self.place_label(head);
        let index = self.load_carrier(&index_carrier);
        let length = self.load_carrier(&length_carrier);
        let more = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::CompareNumber {
            op: CompareOp::Lt,
            left: index,
            right: length,
            result: more,
        });
        self.emit(LirInstr::BranchIfFalse {
            condition: more,
            target: end,
        });
        let keys = self.load_carrier(&keys_carrier);
        let key = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetArrayElement {
            array: keys,
            index,
            result: key,
        });

        let pushed = self.bind_for_target(scope, target, key)?;
        self.lower_loop_body(body, end, next, label)?;
        self.exit_block_scope(pushed);

        self.place_label(next);
        self.increment_carrier(&index_carrier);
        self.emit(LirInstr::Branch { target: head });
        self.place_label(end);
        Ok(())
    }

    fn increment_carrier(&mut self, carrier: &Carrier) {
        let current = self.load_carrier(carrier);
        let one = self.const_number(1.0);
        let next = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::BinaryNumber {
            op: NumericOp::Add,
            left: current,
            right: one,
            result: next,
        });
        self.store_carrier(carrier, next);
    }

    fn get_iterator(&mut self, iterable: &Expr) -> LowerResult<TempId> {
        let iterable = self.lower_expr(iterable)?;
        let iterable = self.ensure_object(iterable);
        let iterator = self.new_temp(ValueStorage::reference(ValueType::Iterator));
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::GetIterator,
            args: vec![iterable],
            result: iterator,
        });
        Ok(iterator)
    }

    /// Advance the iterator; branches to `exhausted` when it is done and yields
    /// the step value otherwise
    fn iterator_step(&mut self, iterator: &Carrier, exhausted: LabelId) -> TempId {
        let iterator = self.load_carrier(iterator);
        let step = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::IteratorNext,
            args: vec![iterator],
            result: step,
        });
        let done = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::IteratorResultDone,
            args: vec![step],
            result: done,
        });
        let has_value = self.new_label();
        self.emit(LirInstr::BranchIfFalse {
            condition: done,
            target: has_value,
        });
        self.emit(LirInstr::Branch { target: exhausted });
        self.place_label(has_value);
        let value = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::IteratorResultValue,
            args: vec![step],
            result: value,
        });
        value
    }

    fn close_iterator(&mut self, iterator: &Carrier) {
        let iterator = self.load_carrier(iterator);
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallRuntime {
            helper: RuntimeHelper::IteratorClose,
            args: vec![iterator],
            result,
        });
    }

    /// `for-of` whose body runs without suspending: the iteration sits in a native
    /// protected region whose finally closes an unfinished iterator
    fn lower_for_of(
        &mut self,
        scope: Option<ScopeId>,
        target: &ForTarget,
        iterable: &Expr,
        body: &Stmt,
        label: Option<String>,
    ) -> LowerResult<()> {
        let try_start = self.new_label();
        let head = self.new_label();
        let exhausted = self.new_label();
        let handler_start = self.new_label();
        let skip_close = self.new_label();
        let handler_end = self.new_label();
        let end = self.new_label();

        let iterator = self.get_iterator(iterable)?;
        let iterator_carrier =
            self.join_carrier("iterator", ValueStorage::reference(ValueType::Iterator));
        self.store_carrier(&iterator_carrier, iterator);
        let done_carrier = self.join_carrier("iteratorDone", ValueStorage::bool());
        let no = self.const_bool(false);
        self.store_carrier(&done_carrier, no);

        self.control
            .push(ControlContext::loop_context(end, head, label));
        let region = self.native_region(false);
        self.push_region(region);

        self.place_label(try_start);
        self.place_label(head);
        // a throwing `next()` leaves the iterator done, so the finally skips the close
        let yes = self.const_bool(true);
        self.store_carrier(&done_carrier, yes);
        let value = self.iterator_step(&iterator_carrier, exhausted);
        let no = self.const_bool(false);
        self.store_carrier(&done_carrier, no);
        let pushed = self.bind_for_target(scope, target, value)?;
        self.lower_stmt(body)?;
        self.exit_block_scope(pushed);
        self.emit(LirInstr::Branch { target: head });

        self.place_label(exhausted);
        self.emit(LirInstr::Leave { target: end });

        self.pop_region();
        self.control.pop();

        self.place_label(handler_start);
        let region = self.native_region(true);
        self.push_region(region);
        let done = self.load_carrier(&done_carrier);
        self.emit(LirInstr::BranchIfTrue {
            condition: done,
            target: skip_close,
        });
        self.close_iterator(&iterator_carrier);
        self.place_label(skip_close);
        self.emit(LirInstr::EndFinally);
        self.pop_region();
        self.place_label(handler_end);

        self.body.exception_regions.push(ExceptionRegion {
            kind: RegionKind::Finally,
            try_start,
            try_end: handler_start,
            handler_start,
            handler_end,
            catch_type: None,
        });
        self.place_label(end);
        Ok(())
    }

    /// `for-of` whose body suspends: no native region may span the body, so only a
    /// `break` closes the iterator
    fn lower_for_of_resumable(
        &mut self,
        scope: Option<ScopeId>,
        target: &ForTarget,
        iterable: &Expr,
        body: &Stmt,
        label: Option<String>,
    ) -> LowerResult<()> {
        let head = self.new_label();
        let close = self.new_label();
        let end = self.new_label();

        let iterator = self.get_iterator(iterable)?;
        let iterator_carrier =
            self.durable_carrier("iterator", ValueStorage::reference(ValueType::Iterator));
        self.store_carrier(&iterator_carrier, iterator);

        self.place_label(head);
        let value = self.iterator_step(&iterator_carrier, end);
        let pushed = self.bind_for_target(scope, target, value)?;
        self.lower_loop_body(body, close, head, label)?;
        self.exit_block_scope(pushed);
        self.emit(LirInstr::Branch { target: head });

        self.place_label(close);
        self.close_iterator(&iterator_carrier);
        self.place_label(end);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::hir::{
        BinaryOp, BindingKind, ClassRegistry, DeclKind, Expr, ForTarget, FunctionKind,
        HirFunction, Pattern, ScopeKind, ScopeTree, Stmt,
    };
    use crate::lir::{LirInstr, PrettyPrint, RegionKind, RuntimeHelper, SlotId};
    use crate::lower::Lowerer;
    use crate::options::LoweringOptions;

    fn lower(function: &HirFunction, scopes: &ScopeTree) -> crate::lir::MethodBody {
        let registry = ClassRegistry::new();
        let options = LoweringOptions::unoptimized();
        Lowerer::new(function, scopes, &registry, &options)
            .lower()
            .unwrap()
    }

    #[test]
    fn test_while_loop_branches_back_to_head() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let i = scopes.add_binding(f, "i", BindingKind::Let);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![
            Stmt::let_decl(i, Expr::num(0.0)),
            Stmt::While {
                test: Expr::binary(BinaryOp::Lt, Expr::var(i), Expr::num(3.0)),
                body: Box::new(Stmt::expr(Expr::assign(
                    i,
                    Expr::binary(BinaryOp::Add, Expr::var(i), Expr::num(1.0)),
                ))),
            },
        ];

        let output = lower(&function, &scopes).pretty_print();
        assert!(output.contains("L0:"));
        assert!(output.contains("brfalse"));
        assert!(output.contains("br L0"));
    }

    #[test]
    fn test_for_of_closes_iterator_in_finally() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let items = scopes.add_parameter(f, "items", 0);
        let x = scopes.add_binding(f, "x", BindingKind::Const);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![Stmt::ForOf {
            scope: None,
            target: ForTarget {
                pattern: Pattern::Binding(x),
                declaration: Some(DeclKind::Const),
            },
            iterable: Expr::var(items),
            body: Box::new(Stmt::Break(None)),
        }];

        let body = lower(&function, &scopes);
        assert_eq!(body.exception_regions.len(), 1);
        assert_eq!(body.exception_regions[0].kind, RegionKind::Finally);
        let output = body.pretty_print();
        assert!(output.contains("IteratorClose"));
        assert!(output.contains("endfinally"));
        assert!(output.contains("leave"));
    }

    #[test]
    fn test_iterator_is_marked_done_around_next() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let items = scopes.add_parameter(f, "items", 0);
        let x = scopes.add_binding(f, "x", BindingKind::Const);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![Stmt::ForOf {
            scope: None,
            target: ForTarget {
                pattern: Pattern::Binding(x),
                declaration: Some(DeclKind::Const),
            },
            iterable: Expr::var(items),
            body: Box::new(Stmt::Empty),
        }];

        let body = lower(&function, &scopes);
        let done = body
            .slots
            .iter()
            .position(|slot| slot.name == "$iteratorDone")
            .map(|index| SlotId(index as u32))
            .unwrap();
        let flag_stores: Vec<(usize, bool)> = body
            .instructions
            .windows(2)
            .enumerate()
            .filter_map(|(index, pair)| match pair {
                [LirInstr::ConstBool { value, result }, LirInstr::StoreSlot { slot, value: stored }]
                    if *slot == done && stored == result =>
                {
                    Some((index, *value))
                }
                _ => None,
            })
            .collect();
        let flags: Vec<bool> = flag_stores.iter().map(|(_, value)| *value).collect();
        assert_eq!(flags, vec![false, true, false]);

        let next_at = body
            .instructions
            .iter()
            .position(|instr| {
                matches!(
                    instr,
                    LirInstr::CallRuntime {
                        helper: RuntimeHelper::IteratorNext,
                        ..
                    }
                )
            })
            .unwrap();
        // set before `next()`, cleared only once the step produced a value
        assert!(flag_stores[1].0 < next_at);
        assert!(flag_stores[2].0 > next_at);
        let value_at = body
            .instructions
            .iter()
            .position(|instr| {
                matches!(
                    instr,
                    LirInstr::CallRuntime {
                        helper: RuntimeHelper::IteratorResultValue,
                        ..
                    }
                )
            })
            .unwrap();
        assert!(flag_stores[2].0 > value_at);
    }

    #[test]
    fn test_break_outside_loop_is_declined() {
        let scopes = ScopeTree::new("main");
        let mut main = HirFunction::new("main", FunctionKind::Main, scopes.global());
        main.body = vec![Stmt::Break(None)];
        let registry = ClassRegistry::new();
        let options = LoweringOptions::unoptimized();
        assert!(Lowerer::new(&main, &scopes, &registry, &options)
            .lower()
            .is_err());
    }
}
