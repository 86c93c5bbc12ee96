//! Control Flow Lowering Utilities
//!
//! Break/continue targets, enclosing exception regions, and the exits that must
//! respect them: `break`, `continue`, `return` and `throw`.

use super::Lowerer;
use crate::error::{unsupported, LowerResult};
use crate::lir::{LabelId, LirInstr, TempId};

/// Target of `break` and `continue` statements
#[derive(Debug, Clone)]
pub(crate) struct ControlContext {
    /// Label to jump to for `break`
    pub break_label: LabelId,
    /// Label to jump to for `continue`; `None` for switch and labeled blocks
    pub continue_label: Option<LabelId>,
    /// Source label naming this statement
    pub label: Option<String>,
    /// Loops and switch; a labeled block is only left by naming its label
    pub takes_unlabeled_break: bool,
}

impl ControlContext {
    pub fn loop_context(break_label: LabelId, continue_label: LabelId, label: Option<String>) -> Self {
        Self {
            break_label,
            continue_label: Some(continue_label),
            label,
            takes_unlabeled_break: true,
        }
    }

    pub fn switch_context(break_label: LabelId) -> Self {
        Self {
            break_label,
            continue_label: None,
            label: None,
            takes_unlabeled_break: true,
        }
    }

    pub fn labeled_block(break_label: LabelId, label: String) -> Self {
        Self {
            break_label,
            continue_label: None,
            label: Some(label),
            takes_unlabeled_break: false,
        }
    }
}

/// Stack of active break/continue targets
#[derive(Debug, Default)]
pub(crate) struct ControlFlowStack {
    stack: Vec<ControlContext>,
}

impl ControlFlowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ctx: ControlContext) {
        self.stack.push(ctx);
    }

    pub fn pop(&mut self) -> Option<ControlContext> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Index and label of the `break` target.
    ///
    /// An unlabeled `break` skips labeled blocks and exits the innermost loop or switch.
    pub fn resolve_break(&self, label: Option<&str>) -> Option<(usize, LabelId)> {
        let index = match label {
            None => self
                .stack
                .iter()
                .rposition(|ctx| ctx.takes_unlabeled_break)?,
            Some(name) => self
                .stack
                .iter()
                .rposition(|ctx| ctx.label.as_deref() == Some(name))?,
        };
        Some((index, self.stack[index].break_label))
    }

    /// Index and label of the `continue` target.
    ///
    /// A labeled `continue` naming a statement that is not a loop has no target.
    pub fn resolve_continue(&self, label: Option<&str>) -> Option<(usize, LabelId)> {
        let index = match label {
            None => self
                .stack
                .iter()
                .rposition(|ctx| ctx.continue_label.is_some())?,
            Some(name) => self
                .stack
                .iter()
                .rposition(|ctx| ctx.label.as_deref() == Some(name))?,
        };
        self.stack[index]
            .continue_label
            .map(|continue_label| (index, continue_label))
    }
}

/// Synthetic capture-object fields of one routed try region
#[derive(Debug, Clone)]
pub(crate) struct PendingFields {
    pub exception: String,
    pub has_exception: String,
    pub return_value: String,
    pub has_return: String,
}

/// Finally labels of a routed try region
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinallyRoute {
    pub entry: LabelId,
    pub exit: LabelId,
    /// Code being lowered is the finally block itself
    pub in_finally: bool,
}

/// Try region of a resumable function that contains a suspend point. Exceptions and
/// returns are routed through state fields and branches instead of native handlers.
#[derive(Debug, Clone)]
pub(crate) struct RoutingContext {
    /// Where an explicit throw or a rejected await continues
    pub throw_label: LabelId,
    /// Resume state registered at `throw_label` (async functions only)
    pub throw_state: Option<u32>,
    pub fields: PendingFields,
    pub finally: Option<FinallyRoute>,
    /// Control stack depth when the region was entered
    pub control_depth: usize,
}

/// Exception region enclosing the code being lowered
#[derive(Debug, Clone)]
pub(crate) enum Region {
    /// Native protected block or catch handler
    Protected { control_depth: usize },
    /// Native finally handler
    FinallyHandler { control_depth: usize },
    Routed(RoutingContext),
}

impl Region {
    fn control_depth(&self) -> usize {
        match self {
            Region::Protected { control_depth } | Region::FinallyHandler { control_depth } => {
                *control_depth
            }
            Region::Routed(ctx) => ctx.control_depth,
        }
    }

    fn is_native(&self) -> bool {
        !matches!(self, Region::Routed(_))
    }

    fn routed_finally(&self) -> Option<(&PendingFields, FinallyRoute)> {
        match self {
            Region::Routed(RoutingContext {
                fields,
                finally: Some(finally),
                ..
            }) => Some((fields, *finally)),
            _ => None,
        }
    }
}

impl<'a> Lowerer<'a> {
    pub(crate) fn push_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub(crate) fn pop_region(&mut self) {
        self.regions.pop();
    }

    pub(crate) fn native_region(&self, finally_handler: bool) -> Region {
        let control_depth = self.control.depth();
        if finally_handler {
            Region::FinallyHandler { control_depth }
        } else {
            Region::Protected { control_depth }
        }
    }

    pub(crate) fn innermost_routing(&self) -> Option<&RoutingContext> {
        match self.regions.last() {
            Some(Region::Routed(ctx)) => Some(ctx),
            _ => None,
        }
    }

    pub(crate) fn in_native_region(&self) -> bool {
        self.regions.iter().any(Region::is_native)
    }

    pub(crate) fn emit_break(&mut self, label: Option<&str>) -> LowerResult<()> {
        let Some((index, target)) = self.control.resolve_break(label) else {
            return unsupported("break without a target");
        };
        self.emit_jump_out(index, target)
    }

    pub(crate) fn emit_continue(&mut self, label: Option<&str>) -> LowerResult<()> {
        let Some((index, target)) = self.control.resolve_continue(label) else {
            return unsupported("continue without a loop target");
        };
        self.emit_jump_out(index, target)
    }

    /// Jump to the target of control context `index`, leaving every region entered
    /// after it
    fn emit_jump_out(&mut self, index: usize, target: LabelId) -> LowerResult<()> {
        let mut leave = false;
        for region in self.regions.iter().rev() {
            if region.control_depth() <= index {
                break;
            }
            match region {
                Region::Protected { .. } => leave = true,
                Region::FinallyHandler { .. } => {
                    return unsupported("jump out of a finally handler");
                }
                Region::Routed(ctx) if ctx.finally.is_some() => {
                    return unsupported("jump across a routed finally block");
                }
                Region::Routed(_) => {}
            }
        }
        if leave {
            self.emit(LirInstr::Leave { target });
        } else {
            self.emit(LirInstr::Branch { target });
        }
        Ok(())
    }

    pub(crate) fn emit_return(&mut self, value: TempId) -> LowerResult<()> {
        let value = self.ensure_object(value);

        if let Some(native) = self.regions.iter().rposition(Region::is_native) {
            if self
                .regions
                .iter()
                .any(|region| matches!(region, Region::FinallyHandler { .. }))
            {
                return unsupported("return inside a finally handler");
            }
            if self.regions[..native]
                .iter()
                .any(|region| region.routed_finally().is_some())
            {
                return unsupported("return from a protected region inside a routed finally");
            }
            let epilogue = self.return_epilogue();
            self.store_slot(epilogue.slot, value);
            self.emit(LirInstr::Leave {
                target: epilogue.label,
            });
            return Ok(());
        }

        let route = self.regions.iter().rev().find_map(|region| {
            region
                .routed_finally()
                .map(|(fields, finally)| (fields.clone(), finally))
        });
        match route {
            None => self.emit(LirInstr::Return { value }),
            Some((fields, finally)) => {
                self.store_state(&fields.return_value, value);
                let yes = self.const_bool(true);
                self.store_state(&fields.has_return, yes);
                let no = self.const_bool(false);
                self.store_state(&fields.has_exception, no);
                let null = self.const_null();
                self.store_state(&fields.exception, null);
                let target = if finally.in_finally {
                    finally.exit
                } else {
                    finally.entry
                };
                self.emit(LirInstr::Branch { target });
            }
        }
        Ok(())
    }

    pub(crate) fn emit_throw(&mut self, value: TempId) -> LowerResult<()> {
        let value = self.ensure_object(value);
        match self.regions.last() {
            Some(Region::Routed(ctx)) => {
                let field = ctx.fields.exception.clone();
                let target = ctx.throw_label;
                self.store_state(&field, value);
                self.emit(LirInstr::Branch { target });
            }
            Some(_) => self.emit(LirInstr::Throw { value }),
            None if self.function.is_async => self.emit(LirInstr::AsyncReject { reason: value }),
            None => self.emit(LirInstr::Throw { value }),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlabeled_continue_skips_switch() {
        let mut stack = ControlFlowStack::new();
        stack.push(ControlContext::loop_context(LabelId(1), LabelId(2), None));
        stack.push(ControlContext::switch_context(LabelId(3)));
        assert_eq!(stack.resolve_break(None), Some((1, LabelId(3))));
        assert_eq!(stack.resolve_continue(None), Some((0, LabelId(2))));
    }

    #[test]
    fn test_labeled_resolution() {
        let mut stack = ControlFlowStack::new();
        stack.push(ControlContext::loop_context(
            LabelId(1),
            LabelId(2),
            Some("outer".into()),
        ));
        stack.push(ControlContext::labeled_block(LabelId(5), "block".into()));
        stack.push(ControlContext::loop_context(LabelId(3), LabelId(4), None));
        assert_eq!(stack.resolve_break(Some("outer")), Some((0, LabelId(1))));
        assert_eq!(stack.resolve_continue(Some("outer")), Some((0, LabelId(2))));
        assert_eq!(stack.resolve_break(Some("block")), Some((1, LabelId(5))));
        assert_eq!(stack.resolve_continue(Some("block")), None);
        assert_eq!(stack.resolve_break(Some("missing")), None);
    }

    #[test]
    fn test_unlabeled_break_skips_labeled_block() {
        let mut stack = ControlFlowStack::new();
        stack.push(ControlContext::loop_context(LabelId(1), LabelId(2), None));
        stack.push(ControlContext::labeled_block(LabelId(3), "block".into()));
        assert_eq!(stack.resolve_break(None), Some((0, LabelId(1))));
        assert_eq!(stack.resolve_break(Some("block")), Some((1, LabelId(3))));
    }

    #[test]
    fn test_empty_stack_has_no_targets() {
        let stack = ControlFlowStack::new();
        assert_eq!(stack.resolve_break(None), None);
        assert_eq!(stack.resolve_continue(None), None);
    }
}
