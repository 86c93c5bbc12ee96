//! Try statements containing suspend points
//!
//! Native protected regions cannot span a suspend point, so these are compiled to
//! explicit branches. A throw stores the exception in a pending field and jumps to
//! the handler; a return stores a pending return value and jumps to the finally
//! block; the finally exit re-dispatches whatever is pending.

use crate::error::LowerResult;
use crate::hir::{CatchClause, Stmt};
use crate::lir::{LabelId, LirInstr, ValueStorage};
use crate::lower::bindings::BindMode;
use crate::lower::control_flow::{FinallyRoute, PendingFields, Region, RoutingContext};
use crate::lower::Lowerer;

impl<'a> Lowerer<'a> {
    fn allocate_pending_fields(&mut self) -> PendingFields {
        let suffix = match self.routed_regions {
            0 => String::new(),
            n => n.to_string(),
        };
        self.routed_regions += 1;
        PendingFields {
            exception: format!("_pendingException{}", suffix),
            has_exception: format!("_hasPendingException{}", suffix),
            return_value: format!("_pendingReturn{}", suffix),
            has_return: format!("_hasPendingReturn{}", suffix),
        }
    }

    fn routing_context(
        &mut self,
        fields: &PendingFields,
        throw_label: LabelId,
        finally: Option<FinallyRoute>,
    ) -> Region {
        let throw_state = self.register_reject_state(throw_label);
        Region::Routed(RoutingContext {
            throw_label,
            throw_state,
            fields: fields.clone(),
            finally,
            control_depth: self.control.depth(),
        })
    }

    fn set_flag(&mut self, name: &str, value: bool) {
        let flag = self.const_bool(value);
        self.store_state(name, flag);
    }

    fn clear_value(&mut self, name: &str) {
        let null = self.const_null();
        self.store_state(name, null);
    }

    /// Take the pending exception and bind it to the catch parameter
    fn lower_routed_handler(
        &mut self,
        fields: &PendingFields,
        handler: &CatchClause,
    ) -> LowerResult<()> {
        let exception = self.load_state(&fields.exception, ValueStorage::object());
        self.clear_value(&fields.exception);
        self.set_flag(&fields.has_exception, false);

        let pushed = self.enter_block_scope(handler.scope);
        if let Some(param) = &handler.param {
            self.bind_pattern(param, exception, BindMode::Declare)?;
        }
        self.lower_block_body(&handler.body)?;
        self.exit_block_scope(pushed);
        Ok(())
    }

    pub(crate) fn lower_routed_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
    ) -> LowerResult<()> {
        let fields = self.allocate_pending_fields();
        tracing::trace!(field = %fields.exception, "routing try region through state fields");
        match finalizer {
            None => match handler {
                Some(handler) => self.lower_routed_catch_only(&fields, block, handler),
                None => self.lower_block_body(block),
            },
            Some(finalizer) => self.lower_routed_finally(&fields, block, handler, finalizer),
        }
    }

    fn lower_routed_catch_only(
        &mut self,
        fields: &PendingFields,
        block: &[Stmt],
        handler: &CatchClause,
    ) -> LowerResult<()> {
        let catch_label = self.new_label();
        let after = self.new_label();
        self.clear_value(&fields.exception);

        let region = self.routing_context(fields, catch_label, None);
        self.push_region(region);
        self.lower_block_body(block)?;
        self.pop_region();
        self.emit(LirInstr::Branch { target: after });

        self.place_label(catch_label);
        self.lower_routed_handler(fields, handler)?;
        self.place_label(after);
        Ok(())
    }

    fn lower_routed_finally(
        &mut self,
        fields: &PendingFields,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: &[Stmt],
    ) -> LowerResult<()> {
        let catch_label = self.new_label();
        let exception_to_finally = self.new_label();
        let exception_in_finally = self.new_label();
        let finally_entry = self.new_label();
        let finally_exit = self.new_label();
        let check_return = self.new_label();
        let after = self.new_label();

        self.clear_value(&fields.exception);
        self.set_flag(&fields.has_exception, false);
        self.clear_value(&fields.return_value);
        self.set_flag(&fields.has_return, false);

        let route = FinallyRoute {
            entry: finally_entry,
            exit: finally_exit,
            in_finally: false,
        };

        // try block
        let throw_target = if handler.is_some() {
            catch_label
        } else {
            exception_to_finally
        };
        let region = self.routing_context(fields, throw_target, Some(route));
        self.push_region(region);
        self.lower_block_body(block)?;
        self.pop_region();
        self.emit(LirInstr::Branch {
            target: finally_entry,
        });

        // catch block
        if let Some(handler) = handler {
            self.place_label(catch_label);
            let region = self.routing_context(fields, exception_to_finally, Some(route));
            self.push_region(region);
            self.lower_routed_handler(fields, handler)?;
            self.pop_region();
            self.emit(LirInstr::Branch {
                target: finally_entry,
            });
        }

        self.place_label(exception_to_finally);
        self.set_flag(&fields.has_exception, true);
        self.set_flag(&fields.has_return, false);
        self.emit(LirInstr::Branch {
            target: finally_entry,
        });

        // finally block
        self.place_label(finally_entry);
        let in_finally = FinallyRoute {
            in_finally: true,
            ..route
        };
        let region = self.routing_context(fields, exception_in_finally, Some(in_finally));
        self.push_region(region);
        self.lower_block_body(finalizer)?;
        self.pop_region();
        self.emit(LirInstr::Branch {
            target: finally_exit,
        });

        self.place_label(exception_in_finally);
        self.set_flag(&fields.has_exception, true);
        self.set_flag(&fields.has_return, false);
        self.emit(LirInstr::Branch {
            target: finally_exit,
        });

        // re-dispatch whatever is pending, now outside this region
        self.place_label(finally_exit);
        let has_exception = self.load_state(&fields.has_exception, ValueStorage::bool());
        self.emit(LirInstr::BranchIfFalse {
            condition: has_exception,
            target: check_return,
        });
        let exception = self.load_state(&fields.exception, ValueStorage::object());
        self.emit_throw(exception)?;

        self.place_label(check_return);
        let has_return = self.load_state(&fields.has_return, ValueStorage::bool());
        self.emit(LirInstr::BranchIfFalse {
            condition: has_return,
            target: after,
        });
        let value = self.load_state(&fields.return_value, ValueStorage::object());
        self.emit_return(value)?;

        self.place_label(after);
        Ok(())
    }
}
