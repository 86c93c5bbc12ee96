//! Generators and async functions
//!
//! A resumable body runs as a state machine over its own capture object: every
//! binding and every value that must survive a suspend point lives in a field of that
//! object. Entry dispatches on the resume state to the label registered for it.

mod delegate;
mod try_routing;

use super::Lowerer;
use crate::error::{unsupported, LowerResult};
use crate::hir::Expr;
use crate::lir::{
    AwaitReject, FieldRef, LabelId, LirInstr, ResumeKind, ResumePoint, StateLabel, SuspendKind,
    TempId, ValueStorage,
};

/// Set once the body has run its prologue
const STARTED: &str = "_started";
/// Set by the driver when `return(value)` is requested
pub(crate) const HAS_RETURN: &str = "_hasReturn";
pub(crate) const RETURN_VALUE: &str = "_returnValue";
/// Set by the driver when `throw(error)` is requested
pub(crate) const HAS_RESUME_EXCEPTION: &str = "_hasResumeException";
pub(crate) const RESUME_EXCEPTION: &str = "_resumeException";
pub(crate) const RESUME_VALUE: &str = "_resumeValue";

impl<'a> Lowerer<'a> {
    // ========================================================================
    // State fields
    // ========================================================================

    /// Field of the function's own capture object, declared on first use
    pub(crate) fn state_field(&mut self, name: &str) -> FieldRef {
        if !self.body.state_fields.iter().any(|field| field == name) {
            self.body.state_fields.push(name.to_string());
        }
        FieldRef::new(self.scope_name(self.function.scope), name)
    }

    pub(crate) fn load_state(&mut self, name: &str, storage: ValueStorage) -> TempId {
        let field = self.state_field(name);
        let result = self.new_temp(storage);
        self.emit(LirInstr::LoadLeafScopeField { field, result });
        result
    }

    pub(crate) fn store_state(&mut self, name: &str, value: TempId) {
        let field = self.state_field(name);
        self.emit(LirInstr::StoreLeafScopeField { field, value });
    }

    fn allocate_resume_state(&mut self) -> u32 {
        let state = self.next_resume_state;
        self.next_resume_state += 1;
        state
    }

    /// Resume state entered when an await inside a routed region rejects
    pub(crate) fn register_reject_state(&mut self, label: LabelId) -> Option<u32> {
        if !self.function.is_async {
            return None;
        }
        let resume_state = self.allocate_resume_state();
        self.body.resume_points.push(ResumePoint {
            resume_state,
            resume_label: label,
            result: None,
            kind: ResumeKind::Reject,
        });
        Some(resume_state)
    }

    // ========================================================================
    // Entry
    // ========================================================================

    /// Dispatch placeholder, one-time parameter initialization
    pub(super) fn emit_resume_prologue(&mut self) -> LowerResult<()> {
        let start = self.new_label();
        self.emit(LirInstr::ResumeDispatch {
            targets: Vec::new(),
            start,
        });
        self.place_label(start);

        let body_start = self.new_label();
        let started = self.load_state(STARTED, ValueStorage::bool());
        self.emit(LirInstr::BranchIfTrue {
            condition: started,
            target: body_start,
        });
        let yes = self.const_bool(true);
        self.store_state(STARTED, yes);
        let function = self.function;
        self.lower_parameters(&function.params)?;
        self.place_label(body_start);
        Ok(())
    }

    /// Fill the entry dispatch with every registered resume point
    pub(super) fn patch_resume_dispatch(&mut self) {
        let entries: Vec<StateLabel> = self
            .body
            .resume_points
            .iter()
            .map(|point| StateLabel {
                state: point.resume_state,
                label: point.resume_label,
            })
            .collect();
        if let Some(LirInstr::ResumeDispatch { targets, .. }) = self.body.instructions.first_mut() {
            *targets = entries;
        }
    }

    // ========================================================================
    // Suspend points
    // ========================================================================

    /// Hand `value` to the driver and continue at a fresh resume label
    pub(crate) fn emit_suspend(&mut self, kind: SuspendKind, value: TempId) -> LowerResult<TempId> {
        if self.in_native_region() {
            return unsupported("suspend point inside a native protected region");
        }
        let value = self.ensure_object(value);
        let reject = match (kind, self.innermost_routing()) {
            (SuspendKind::Await, Some(ctx)) => ctx
                .throw_state
                .map(|state| (state, ctx.fields.exception.clone())),
            _ => None,
        };
        let reject = reject.map(|(resume_state, field)| AwaitReject {
            resume_state,
            pending_exception: self.state_field(&field),
        });

        let resume_state = self.allocate_resume_state();
        let resume_label = self.new_label();
        let result = self.new_temp(ValueStorage::object());
        self.body.resume_points.push(ResumePoint {
            resume_state,
            resume_label,
            result: Some(result),
            kind: match kind {
                SuspendKind::Await => ResumeKind::Await,
                SuspendKind::Yield => ResumeKind::Yield,
            },
        });
        self.emit(LirInstr::Suspend {
            kind,
            value,
            resume_state,
            resume_label,
            result,
            reject,
        });
        self.place_label(resume_label);
        Ok(result)
    }

    pub(crate) fn lower_await(&mut self, argument: &Expr) -> LowerResult<TempId> {
        if !self.function.is_async {
            return unsupported("await outside an async function");
        }
        let value = self.lower_expr(argument)?;
        self.emit_suspend(SuspendKind::Await, value)
    }

    pub(crate) fn lower_yield(
        &mut self,
        argument: Option<&Expr>,
        delegate: bool,
    ) -> LowerResult<TempId> {
        if !self.function.is_generator {
            return unsupported("yield outside a generator");
        }
        let value = match argument {
            Some(argument) => self.lower_expr(argument)?,
            None => self.const_undefined(),
        };
        if delegate {
            return self.lower_yield_delegate(value);
        }
        self.emit_yield_value(value)
    }

    /// Yield one value, then honor a `return()` or `throw()` requested by the driver
    pub(crate) fn emit_yield_value(&mut self, value: TempId) -> LowerResult<TempId> {
        let sent = self.emit_suspend(SuspendKind::Yield, value)?;

        let no_return = self.new_label();
        let has_return = self.load_state(HAS_RETURN, ValueStorage::bool());
        self.emit(LirInstr::BranchIfFalse {
            condition: has_return,
            target: no_return,
        });
        let no = self.const_bool(false);
        self.store_state(HAS_RETURN, no);
        let return_value = self.load_state(RETURN_VALUE, ValueStorage::object());
        self.emit_return(return_value)?;
        self.place_label(no_return);

        let no_throw = self.new_label();
        let has_exception = self.load_state(HAS_RESUME_EXCEPTION, ValueStorage::bool());
        self.emit(LirInstr::BranchIfFalse {
            condition: has_exception,
            target: no_throw,
        });
        let no = self.const_bool(false);
        self.store_state(HAS_RESUME_EXCEPTION, no);
        let exception = self.load_state(RESUME_EXCEPTION, ValueStorage::object());
        self.emit_throw(exception)?;
        self.place_label(no_throw);

        Ok(sent)
    }
}
