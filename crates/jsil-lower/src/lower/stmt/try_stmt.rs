//! Native try/catch/finally
//!
//! Used whenever no suspend point sits inside the statement. A try with both a
//! catch and a finally becomes a catch region nested in a finally region.

use crate::error::LowerResult;
use crate::hir::{CatchClause, Stmt};
use crate::lir::{ExceptionRegion, LabelId, LirInstr, RegionKind, ValueStorage};
use crate::lower::bindings::BindMode;
use crate::lower::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
    ) -> LowerResult<()> {
        let after = self.new_label();
        match finalizer {
            None => match handler {
                Some(handler) => self.lower_try_catch(block, handler, after)?,
                None => self.lower_block_body(block)?,
            },
            Some(finalizer) => {
                let try_start = self.new_label();
                let handler_start = self.new_label();
                let handler_end = self.new_label();

                let region = self.native_region(false);
                self.push_region(region);
                self.place_label(try_start);
                match handler {
                    Some(handler) => self.lower_try_catch(block, handler, after)?,
                    None => {
                        self.lower_block_body(block)?;
                        self.emit(LirInstr::Leave { target: after });
                    }
                }
                self.pop_region();

                self.place_label(handler_start);
                let region = self.native_region(true);
                self.push_region(region);
                self.lower_block_body(finalizer)?;
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
            }
        }
        self.place_label(after);
        Ok(())
    }

    /// Protected block and catch handler, both leaving to `after`
    fn lower_try_catch(
        &mut self,
        block: &[Stmt],
        handler: &CatchClause,
        after: LabelId,
    ) -> LowerResult<()> {
        let try_start = self.new_label();
        let handler_start = self.new_label();
        let handler_end = self.new_label();

        let region = self.native_region(false);
        self.push_region(region);
        self.place_label(try_start);
        self.lower_block_body(block)?;
        self.emit(LirInstr::Leave { target: after });
        self.pop_region();

        self.place_label(handler_start);
        let region = self.native_region(false);
        self.push_region(region);
        let exception = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::LoadException { result: exception });
        let pushed = self.enter_block_scope(handler.scope);
        if let Some(param) = &handler.param {
            self.bind_pattern(param, exception, BindMode::Declare)?;
        }
        self.lower_block_body(&handler.body)?;
        self.exit_block_scope(pushed);
        self.emit(LirInstr::Leave { target: after });
        self.pop_region();
        self.place_label(handler_end);

        self.body.exception_regions.push(ExceptionRegion {
            kind: RegionKind::Catch,
            try_start,
            try_end: handler_start,
            handler_start,
            handler_end,
            catch_type: None,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::hir::{
        BindingKind, CatchClause, ClassRegistry, Expr, FunctionKind, HirFunction, Pattern,
        ScopeKind, ScopeTree, Stmt,
    };
    use crate::lir::{PrettyPrint, RegionKind};
    use crate::lower::Lowerer;
    use crate::options::LoweringOptions;

    fn try_catch_finally(scopes: &mut ScopeTree) -> HirFunction {
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let e = scopes.add_binding(f, "e", BindingKind::Let);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![Stmt::Try {
            block: vec![Stmt::Return(Some(Expr::num(1.0)))],
            handler: Some(CatchClause {
                scope: None,
                param: Some(Pattern::Binding(e)),
                body: vec![Stmt::Throw(Expr::var(e))],
            }),
            finalizer: Some(vec![Stmt::Empty]),
        }];
        function
    }

    #[test]
    fn test_catch_region_nests_inside_finally_region() {
        let mut scopes = ScopeTree::new("main");
        let function = try_catch_finally(&mut scopes);
        let registry = ClassRegistry::new();
        let options = LoweringOptions::unoptimized();
        let body = Lowerer::new(&function, &scopes, &registry, &options)
            .lower()
            .unwrap();

        let kinds: Vec<_> = body.exception_regions.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RegionKind::Catch, RegionKind::Finally]);

        // the return inside the protected block goes through the epilogue
        let epilogue = body.return_epilogue.unwrap();
        let output = body.pretty_print();
        assert!(output.contains(&format!("leave {}", epilogue.label)));
        assert!(output.contains("exception"));
        assert!(output.contains("endfinally"));
    }

    #[test]
    fn test_return_inside_finally_is_declined() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![Stmt::Try {
            block: vec![Stmt::Empty],
            handler: None,
            finalizer: Some(vec![Stmt::Return(None)]),
        }];
        let registry = ClassRegistry::new();
        let options = LoweringOptions::unoptimized();
        assert!(Lowerer::new(&function, &scopes, &registry, &options)
            .lower()
            .is_err());
    }
}
