//! Binding storage and scope chains
//!
//! Every binding gets exactly one storage decision on first use: an argument slot, a
//! stable local slot, a field of the function's own capture object (or of an active
//! block capture object), or a field of an ancestor capture object reached through the
//! received scope-chain array.

use super::{Carrier, Lowerer};
use crate::error::{unsupported, LowerResult};
use crate::hir::{BindingId, BindingKind, FunctionRef, ScopeId, ScopeKind};
use crate::lir::{
    BuiltInError, FieldRef, LirInstr, ScopeSlotSource, SlotId, TempId, ValueStorage, ValueType,
};

/// Storage decision for a binding
#[derive(Debug, Clone)]
pub(crate) enum BindingStorage {
    /// Incoming argument of a non-resumable function
    Argument { index: u16 },
    /// Local slot, never captured
    StableLocal { slot: SlotId },
    /// Field of a capture object owned by the current function
    LeafScopeField { field: FieldRef, holder: ScopeHolder },
    /// Field of an enclosing function's capture object
    AncestorScopeField { index: usize, field: FieldRef },
}

/// Capture object holding a leaf field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeHolder {
    /// The function's own capture object
    Function,
    /// Capture object of a block scope, live while the block is active
    Block(ScopeId),
}

/// Whether a store initializes the binding or assigns to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    Declare,
    Assign,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn binding_storage(&mut self, id: BindingId) -> LowerResult<BindingStorage> {
        if let Some(storage) = self.binding_storage.get(&id) {
            return Ok(storage.clone());
        }
        let storage = self.classify_binding(id)?;
        self.binding_storage.insert(id, storage.clone());
        Ok(storage)
    }

    fn classify_binding(&mut self, id: BindingId) -> LowerResult<BindingStorage> {
        let scopes = self.scopes;
        let binding = scopes.binding(id);
        let own_scope = self.function.scope;

        if scopes.enclosing_function(binding.scope) != own_scope {
            let Some(position) = self.chain_layout.iter().position(|s| *s == binding.scope)
            else {
                return unsupported(format_args!(
                    "binding `{}` is not reachable through the scope chain",
                    binding.name
                ));
            };
            return Ok(BindingStorage::AncestorScopeField {
                index: position + self.scope_index_shift(),
                field: FieldRef::new(self.scope_name(binding.scope), binding.name.as_str()),
            });
        }

        let in_block = binding.scope != own_scope;
        if binding.captured {
            let holder = if in_block {
                ScopeHolder::Block(binding.scope)
            } else {
                ScopeHolder::Function
            };
            return Ok(BindingStorage::LeafScopeField {
                field: FieldRef::new(self.scope_name(binding.scope), binding.name.as_str()),
                holder,
            });
        }

        // Resumable bodies keep every local on the state object
        if self.function.is_resumable() {
            let name = if in_block {
                format!("{}${}", binding.name, id.0)
            } else {
                binding.name.clone()
            };
            return Ok(BindingStorage::LeafScopeField {
                field: FieldRef::new(self.scope_name(own_scope), name),
                holder: ScopeHolder::Function,
            });
        }

        if let (BindingKind::Parameter, Some(index)) = (binding.kind, binding.param_index) {
            return Ok(BindingStorage::Argument { index });
        }

        let storage = binding
            .stable_type
            .as_ref()
            .map(ValueStorage::for_type)
            .unwrap_or_else(ValueStorage::object);
        let slot = self.new_slot(binding.name.clone(), storage, Some(id));
        Ok(BindingStorage::StableLocal { slot })
    }

    /// Resumable functions receive their own state object at index 0
    fn scope_index_shift(&self) -> usize {
        usize::from(self.function.is_resumable())
    }

    pub(crate) fn load_binding(&mut self, id: BindingId) -> LowerResult<TempId> {
        let result = match self.binding_storage(id)? {
            BindingStorage::Argument { index } => {
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::LoadArgument { index, result });
                result
            }
            BindingStorage::StableLocal { slot } => self.load_slot(slot),
            BindingStorage::LeafScopeField {
                field,
                holder: ScopeHolder::Function,
            } => {
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::LoadLeafScopeField { field, result });
                result
            }
            BindingStorage::LeafScopeField {
                field,
                holder: ScopeHolder::Block(scope),
            } => {
                let instance = self.block_scope_instance(scope)?;
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::LoadScopeField {
                    scope: instance,
                    field,
                    result,
                });
                result
            }
            BindingStorage::AncestorScopeField { index, field } => {
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::LoadParentScopeField {
                    index,
                    field,
                    result,
                });
                result
            }
        };
        Ok(result)
    }

    pub(crate) fn store_binding(
        &mut self,
        id: BindingId,
        value: TempId,
        mode: BindMode,
    ) -> LowerResult<()> {
        if self.scopes.binding(id).kind == BindingKind::Const && mode == BindMode::Assign {
            return self.emit_builtin_throw(
                BuiltInError::TypeError,
                "Assignment to constant variable.".to_string(),
            );
        }

        match self.binding_storage(id)? {
            BindingStorage::Argument { index } => {
                let value = self.ensure_object(value);
                self.emit(LirInstr::StoreArgument { index, value });
            }
            BindingStorage::StableLocal { slot } => self.store_slot(slot, value),
            BindingStorage::LeafScopeField {
                field,
                holder: ScopeHolder::Function,
            } => {
                let value = self.ensure_object(value);
                self.emit(LirInstr::StoreLeafScopeField { field, value });
            }
            BindingStorage::LeafScopeField {
                field,
                holder: ScopeHolder::Block(scope),
            } => {
                let value = self.ensure_object(value);
                let instance = self.block_scope_instance(scope)?;
                self.emit(LirInstr::StoreScopeField {
                    scope: instance,
                    field,
                    value,
                });
            }
            BindingStorage::AncestorScopeField { index, field } => {
                let value = self.ensure_object(value);
                self.emit(LirInstr::StoreParentScopeField {
                    index,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Throw a built-in error detected at compile time
    pub(crate) fn emit_builtin_throw(
        &mut self,
        kind: BuiltInError,
        message: String,
    ) -> LowerResult<()> {
        let error = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::NewBuiltInError {
            kind,
            message,
            result: error,
        });
        self.emit_throw(error)
    }

    // ========================================================================
    // Block capture objects
    // ========================================================================

    /// Block scope that needs its own capture object
    fn needs_block_instance(&self, scope: ScopeId) -> bool {
        self.scopes.scope(scope).kind == ScopeKind::Block
            && !self.scopes.captured_bindings(scope).is_empty()
    }

    /// Allocate the capture object of a block scope and make it active.
    /// Returns whether a capture object was pushed.
    pub(crate) fn enter_block_scope(&mut self, scope: Option<ScopeId>) -> bool {
        let Some(scope) = scope else {
            return false;
        };
        if !self.needs_block_instance(scope) {
            return false;
        }
        let storage = ValueStorage::reference(ValueType::Scope(self.scope_name(scope)));
        let carrier = self.durable_carrier("scope", storage);
        self.create_block_instance(scope, &carrier);
        self.active_blocks.push((scope, carrier));
        true
    }

    pub(crate) fn exit_block_scope(&mut self, pushed: bool) {
        if pushed {
            self.active_blocks.pop();
        }
    }

    fn create_block_instance(&mut self, scope: ScopeId, carrier: &Carrier) -> TempId {
        let name = self.scope_name(scope);
        let instance = self.new_temp(ValueStorage::reference(ValueType::Scope(name.clone())));
        self.emit(LirInstr::CreateScopeInstance {
            scope: name,
            result: instance,
        });
        self.store_carrier(carrier, instance);
        instance
    }

    fn active_block_carrier(&self, scope: ScopeId) -> Option<Carrier> {
        self.active_blocks
            .iter()
            .rev()
            .find(|(active, _)| *active == scope)
            .map(|(_, carrier)| carrier.clone())
    }

    fn block_scope_instance(&mut self, scope: ScopeId) -> LowerResult<TempId> {
        match self.active_block_carrier(scope) {
            Some(carrier) => Ok(self.load_carrier(&carrier)),
            None => unsupported("block capture object used outside its block"),
        }
    }

    /// Start a fresh capture object for the next loop iteration, copying the
    /// current values of captured bindings
    pub(crate) fn renew_block_scope(&mut self, scope: ScopeId, copy_values: bool) -> LowerResult<()> {
        let Some(carrier) = self.active_block_carrier(scope) else {
            return Ok(());
        };
        let previous = copy_values.then(|| self.load_carrier(&carrier));
        let fresh = self.create_block_instance(scope, &carrier);
        if let Some(previous) = previous {
            for binding in self.scopes.captured_bindings(scope) {
                let name = self.scopes.binding(binding).name.clone();
                let field = FieldRef::new(self.scope_name(scope), name);
                let value = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::LoadScopeField {
                    scope: previous,
                    field: field.clone(),
                    result: value,
                });
                self.emit(LirInstr::StoreScopeField {
                    scope: fresh,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scope-chain arrays
    // ========================================================================

    /// Scope-chain array for a direct call or closure of the function owning `callee_scope`
    pub(crate) fn build_callee_scopes(&mut self, callee_scope: ScopeId) -> LowerResult<TempId> {
        let layout = self.scopes.chain_layout(callee_scope);
        let mut slots = Vec::with_capacity(layout.len().max(1));
        if layout.is_empty() {
            let global = self.scopes.global();
            if let Some(source) = self.map_scope_slot(global) {
                slots.push(source);
            }
        } else {
            for scope in layout {
                match self.map_scope_slot(scope) {
                    Some(source) => slots.push(source),
                    None => {
                        return unsupported(format_args!(
                            "scope `{}` is not available to the callee",
                            self.scope_name(scope)
                        ))
                    }
                }
            }
        }
        Ok(self.emit_scopes_array(slots))
    }

    fn map_scope_slot(&mut self, scope: ScopeId) -> Option<ScopeSlotSource> {
        if scope == self.function.scope && self.has_leaf_scope {
            return Some(ScopeSlotSource::Leaf);
        }
        if let Some(carrier) = self.active_block_carrier(scope) {
            return Some(ScopeSlotSource::Temp(self.load_carrier(&carrier)));
        }
        let shift = self.scope_index_shift();
        self.chain_layout
            .iter()
            .position(|s| *s == scope)
            .map(|position| ScopeSlotSource::ScopesArgument(position + shift))
    }

    /// The full chain visible at this point, for calls whose callee is unknown
    pub(crate) fn current_scopes_array(&mut self) -> TempId {
        let shift = self.scope_index_shift();
        let mut slots: Vec<ScopeSlotSource> = (0..self.chain_layout.len())
            .map(|position| ScopeSlotSource::ScopesArgument(position + shift))
            .collect();
        if self.has_leaf_scope {
            slots.push(ScopeSlotSource::Leaf);
        }
        let active: Vec<Carrier> = self
            .active_blocks
            .iter()
            .map(|(_, carrier)| carrier.clone())
            .collect();
        for carrier in &active {
            slots.push(ScopeSlotSource::Temp(self.load_carrier(carrier)));
        }
        self.emit_scopes_array(slots)
    }

    fn emit_scopes_array(&mut self, slots: Vec<ScopeSlotSource>) -> TempId {
        let result = self.new_temp(ValueStorage::reference(ValueType::ScopesArray));
        self.emit(LirInstr::BuildScopesArray { slots, result });
        result
    }

    // ========================================================================
    // Closures
    // ========================================================================

    pub(crate) fn lower_closure(&mut self, function: &FunctionRef) -> LowerResult<TempId> {
        let scopes = self.build_callee_scopes(function.scope)?;
        let result = self.new_temp(ValueStorage::reference(ValueType::Function));
        self.emit(LirInstr::CreateBoundFunction {
            callable: function.callable.clone(),
            scopes,
            is_arrow: function.is_arrow,
            result,
        });
        Ok(result)
    }

    pub(crate) fn lower_function_declaration(
        &mut self,
        binding: BindingId,
        function: &FunctionRef,
    ) -> LowerResult<()> {
        let closure = self.lower_closure(function)?;
        self.store_binding(binding, closure, BindMode::Declare)
    }
}
