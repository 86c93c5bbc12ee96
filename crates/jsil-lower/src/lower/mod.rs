//! HIR to LIR Lowering
//!
//! Converts one resolved function body into a flat [`MethodBody`]. All mutable state
//! lives in a [`Lowerer`] session; a declined body simply drops the session.

mod bindings;
mod control_flow;
mod expr;
mod resumable;
mod stmt;

use crate::error::{unsupported, LowerResult};
use crate::hir::{
    BindingId, ClassRegistry, Expr, FunctionKind, HirFunction, Param, Pattern, ScopeId,
    ScopeTree, Stmt,
};
use crate::lir::{
    FieldRef, LabelId, LirInstr, MethodBody, ReturnEpilogue, SlotId, SlotInfo, TempId,
    ValueStorage,
};
use crate::options::LoweringOptions;
use bindings::{BindMode, BindingStorage};
use control_flow::{ControlFlowStack, Region};
use rustc_hash::{FxHashMap, FxHashSet};

/// Where a carrier keeps its value
#[derive(Debug, Clone)]
enum CarrierLocation {
    Slot(SlotId),
    /// Synthetic field on the capture object of a resumable function
    StateField(FieldRef),
}

/// Storage for a value that must outlive the temp that produced it: join points of
/// conditional expressions, loop state, block capture objects.
#[derive(Debug, Clone)]
pub(crate) struct Carrier {
    location: CarrierLocation,
    storage: ValueStorage,
}

/// Lowering session for one function body
pub struct Lowerer<'a> {
    /// Function being lowered
    function: &'a HirFunction,
    /// Scope tree with capture analysis
    scopes: &'a ScopeTree,
    /// User class registry
    registry: &'a ClassRegistry,
    /// Lowering configuration
    options: &'a LoweringOptions,
    /// Body under construction
    body: MethodBody,
    /// Next label id
    next_label: u32,
    /// Next resume state (0 is the initial entry)
    next_resume_state: u32,
    /// Storage decision per binding, fixed on first use
    binding_storage: FxHashMap<BindingId, BindingStorage>,
    /// Slots stored at least once
    written_slots: FxHashSet<SlotId>,
    /// Function declarations already materialized at entry
    hoisted: FxHashSet<BindingId>,
    /// Scope-chain layout this function receives
    chain_layout: Vec<ScopeId>,
    /// The function owns a capture object
    has_leaf_scope: bool,
    /// Block capture objects currently in scope, innermost last
    active_blocks: Vec<(ScopeId, Carrier)>,
    /// Break/continue targets
    control: ControlFlowStack,
    /// Enclosing exception regions, innermost last
    regions: Vec<Region>,
    /// `super(...)` has been lowered (derived constructors)
    super_called: bool,
    /// Synthetic state fields allocated by name prefix
    state_field_counter: u32,
    /// Routed try regions allocated so far
    routed_regions: u32,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        function: &'a HirFunction,
        scopes: &'a ScopeTree,
        registry: &'a ClassRegistry,
        options: &'a LoweringOptions,
    ) -> Self {
        let mut body = MethodBody::new(function.name.clone());
        body.is_async = function.is_async;
        body.is_generator = function.is_generator;

        let chain_layout = scopes.chain_layout(function.scope);
        let has_leaf_scope = function.kind == FunctionKind::Main
            || function.is_resumable()
            || !scopes.captured_bindings(function.scope).is_empty();

        Self {
            function,
            scopes,
            registry,
            options,
            body,
            next_label: 0,
            next_resume_state: 1,
            binding_storage: FxHashMap::default(),
            written_slots: FxHashSet::default(),
            hoisted: FxHashSet::default(),
            chain_layout,
            has_leaf_scope,
            active_blocks: Vec::new(),
            control: ControlFlowStack::new(),
            regions: Vec::new(),
            super_called: false,
            state_field_counter: 0,
            routed_regions: 0,
        }
    }

    /// Lower the whole function body
    pub fn lower(mut self) -> LowerResult<MethodBody> {
        let function = self.function;
        tracing::debug!(
            function = %function.name,
            resumable = function.is_resumable(),
            "lowering function body"
        );

        if function.is_resumable() {
            self.emit_resume_prologue()?;
        } else {
            if self.has_leaf_scope {
                let scope = self.scopes.scope(function.scope).name.clone();
                self.emit(LirInstr::CreateLeafScope { scope });
            }
            self.lower_parameters(&function.params)?;
        }

        self.lower_block_body(&function.body)?;

        let completion = self.const_undefined();
        self.emit_return(completion)?;
        self.emit_return_epilogue();
        if function.is_resumable() {
            self.patch_resume_dispatch();
        }

        self.body.label_count = self.next_label;
        tracing::trace!(
            function = %function.name,
            instructions = self.body.instructions.len(),
            temps = self.body.temp_count(),
            "lowered function body"
        );
        Ok(self.body)
    }

    // ========================================================================
    // Parameters and hoisting
    // ========================================================================

    fn lower_parameters(&mut self, params: &[Param]) -> LowerResult<()> {
        for (index, param) in params.iter().enumerate() {
            let Ok(index) = u16::try_from(index) else {
                return unsupported("too many parameters");
            };
            if let Pattern::Binding(binding) = &param.target {
                if let BindingStorage::Argument { .. } = self.binding_storage(*binding)? {
                    if let Some(default) = &param.default {
                        self.apply_argument_default(index, default)?;
                    }
                    continue;
                }
            }

            let mut value = self.new_temp(ValueStorage::object());
            self.emit(LirInstr::LoadArgument {
                index,
                result: value,
            });
            if let Some(default) = &param.default {
                value = self.apply_default(value, default)?;
            }
            self.bind_pattern(&param.target, value, BindMode::Declare)?;
        }
        Ok(())
    }

    /// Replace an `undefined` argument in place
    fn apply_argument_default(&mut self, index: u16, default: &Expr) -> LowerResult<()> {
        let skip = self.new_label();
        let argument = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::LoadArgument {
            index,
            result: argument,
        });
        let is_undefined = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::IsUndefined {
            value: argument,
            result: is_undefined,
        });
        self.emit(LirInstr::BranchIfFalse {
            condition: is_undefined,
            target: skip,
        });
        let value = self.lower_expr(default)?;
        let value = self.ensure_object(value);
        self.emit(LirInstr::StoreArgument { index, value });
        self.place_label(skip);
        Ok(())
    }

    /// `value === undefined ? default : value`
    pub(crate) fn apply_default(&mut self, value: TempId, default: &Expr) -> LowerResult<TempId> {
        let carrier = self.join_carrier("default", ValueStorage::object());
        let skip = self.new_label();
        let join = self.new_label();
        let is_undefined = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::IsUndefined {
            value,
            result: is_undefined,
        });
        self.emit(LirInstr::BranchIfFalse {
            condition: is_undefined,
            target: skip,
        });
        let replacement = self.lower_expr(default)?;
        self.store_carrier(&carrier, replacement);
        self.emit(LirInstr::Branch { target: join });
        self.place_label(skip);
        self.store_carrier(&carrier, value);
        self.place_label(join);
        Ok(self.load_carrier(&carrier))
    }

    /// Function declarations of a statement list are callable before their
    /// statement runs
    fn hoist_function_declarations(&mut self, body: &[Stmt]) -> LowerResult<()> {
        for stmt in body {
            if let Stmt::FunctionDecl { binding, function } = stmt {
                self.lower_function_declaration(*binding, function)?;
                self.hoisted.insert(*binding);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Temps, labels and emission
    // ========================================================================

    fn alloc_temp(&mut self) -> TempId {
        let id = TempId(self.body.temps.len() as u32);
        self.body.temps.push(None);
        id
    }

    fn define_storage(&mut self, temp: TempId, storage: ValueStorage) {
        let entry = &mut self.body.temps[temp.index()];
        debug_assert!(entry.is_none(), "storage of {} defined twice", temp);
        *entry = Some(storage);
    }

    /// Allocate a temp with a known storage descriptor
    pub(crate) fn new_temp(&mut self, storage: ValueStorage) -> TempId {
        let temp = self.alloc_temp();
        self.define_storage(temp, storage);
        temp
    }

    pub(crate) fn storage_of(&self, temp: TempId) -> ValueStorage {
        self.body.storage_of(temp)
    }

    pub(crate) fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    pub(crate) fn place_label(&mut self, label: LabelId) {
        self.emit(LirInstr::Label { label });
    }

    pub(crate) fn emit(&mut self, instr: LirInstr) {
        self.body.instructions.push(instr);
    }

    // ========================================================================
    // Constants
    // ========================================================================

    pub(crate) fn const_number(&mut self, value: f64) -> TempId {
        let result = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::ConstNumber { value, result });
        result
    }

    pub(crate) fn const_bool(&mut self, value: bool) -> TempId {
        let result = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::ConstBool { value, result });
        result
    }

    pub(crate) fn const_string(&mut self, value: &str) -> TempId {
        let result = self.new_temp(ValueStorage::string());
        self.emit(LirInstr::ConstString {
            value: value.to_string(),
            result,
        });
        result
    }

    pub(crate) fn const_null(&mut self) -> TempId {
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::ConstNull { result });
        result
    }

    pub(crate) fn const_undefined(&mut self) -> TempId {
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::ConstUndefined { result });
        result
    }

    // ========================================================================
    // Coercions
    // ========================================================================

    /// Object-shaped view of a value, boxing unboxed primitives
    pub(crate) fn ensure_object(&mut self, value: TempId) -> TempId {
        let storage = self.storage_of(value);
        if storage.is_object_shaped() {
            return value;
        }
        let boxed = if storage.is_unboxed() {
            ValueStorage::boxed(storage.ty)
        } else {
            ValueStorage::object()
        };
        let result = self.new_temp(boxed);
        self.emit(LirInstr::ConvertToObject {
            source: value,
            result,
        });
        result
    }

    /// Unboxed double view of a value.
    ///
    /// A dynamic `+` that was just emitted for this value is fused into a single
    /// add-and-convert step.
    pub(crate) fn ensure_number(&mut self, value: TempId) -> TempId {
        if self.storage_of(value).is_unboxed_double() {
            return value;
        }
        if let Some(&LirInstr::AddDynamic {
            left,
            right,
            result,
        }) = self.body.instructions.last()
        {
            if result == value {
                self.body.instructions.pop();
                self.body.temps[value.index()] = None;
                self.define_storage(value, ValueStorage::double());
                self.emit(LirInstr::AddAndToNumber {
                    left,
                    right,
                    result: value,
                });
                return value;
            }
        }
        let result = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::ConvertToNumber {
            source: value,
            result,
        });
        result
    }

    /// Unboxed bool view of a value (JavaScript truthiness)
    pub(crate) fn ensure_boolean(&mut self, value: TempId) -> TempId {
        let storage = self.storage_of(value);
        if storage.is_unboxed_bool() {
            return value;
        }
        let result = self.new_temp(ValueStorage::bool());
        if storage.is_unboxed() {
            self.emit(LirInstr::ConvertToBoolean {
                source: value,
                result,
            });
        } else {
            self.emit(LirInstr::IsTruthy {
                source: value,
                result,
            });
        }
        result
    }

    pub(crate) fn ensure_string(&mut self, value: TempId) -> TempId {
        if self.storage_of(value).is_string() {
            return value;
        }
        let result = self.new_temp(ValueStorage::string());
        self.emit(LirInstr::ConvertToString {
            source: value,
            result,
        });
        result
    }

    /// Coerce a value into the representation `storage` expects
    pub(crate) fn coerce_to(&mut self, value: TempId, storage: &ValueStorage) -> TempId {
        if storage.is_unboxed_double() {
            self.ensure_number(value)
        } else if storage.is_unboxed_bool() {
            self.ensure_boolean(value)
        } else {
            self.ensure_object(value)
        }
    }

    // ========================================================================
    // Slots and carriers
    // ========================================================================

    pub(crate) fn new_slot(
        &mut self,
        name: String,
        storage: ValueStorage,
        binding: Option<BindingId>,
    ) -> SlotId {
        let slot = SlotId(self.body.slots.len() as u32);
        self.body.slots.push(SlotInfo {
            name,
            storage,
            binding,
        });
        slot
    }

    fn slot_storage(&self, slot: SlotId) -> ValueStorage {
        self.body
            .slot(slot)
            .map(|info| info.storage.clone())
            .unwrap_or_else(ValueStorage::object)
    }

    pub(crate) fn store_slot(&mut self, slot: SlotId, value: TempId) {
        let storage = self.slot_storage(slot);
        let value = self.coerce_to(value, &storage);
        self.emit(LirInstr::StoreSlot { slot, value });
        if self.written_slots.insert(slot) {
            self.body.single_assignment_slots.insert(slot);
        } else {
            self.body.single_assignment_slots.remove(&slot);
        }
    }

    pub(crate) fn load_slot(&mut self, slot: SlotId) -> TempId {
        let storage = self.slot_storage(slot);
        let result = self.new_temp(storage);
        self.emit(LirInstr::LoadSlot { slot, result });
        result
    }

    /// Carrier for a value joined from several paths without a suspend point in between
    pub(crate) fn join_carrier(&mut self, hint: &str, storage: ValueStorage) -> Carrier {
        let slot = self.new_slot(format!("${}", hint), storage.clone(), None);
        Carrier {
            location: CarrierLocation::Slot(slot),
            storage,
        }
    }

    /// Carrier that survives suspension in resumable functions
    pub(crate) fn durable_carrier(&mut self, hint: &str, storage: ValueStorage) -> Carrier {
        if !self.function.is_resumable() {
            return self.join_carrier(hint, storage);
        }
        self.state_field_counter += 1;
        let name = format!("${}{}", hint, self.state_field_counter);
        let field = self.state_field(&name);
        Carrier {
            location: CarrierLocation::StateField(field),
            storage,
        }
    }

    pub(crate) fn store_carrier(&mut self, carrier: &Carrier, value: TempId) {
        match &carrier.location {
            CarrierLocation::Slot(slot) => self.store_slot(*slot, value),
            CarrierLocation::StateField(field) => {
                let value = self.coerce_to(value, &carrier.storage);
                self.emit(LirInstr::StoreLeafScopeField {
                    field: field.clone(),
                    value,
                });
            }
        }
    }

    pub(crate) fn load_carrier(&mut self, carrier: &Carrier) -> TempId {
        match &carrier.location {
            CarrierLocation::Slot(slot) => self.load_slot(*slot),
            CarrierLocation::StateField(field) => {
                let result = self.new_temp(carrier.storage.clone());
                self.emit(LirInstr::LoadLeafScopeField {
                    field: field.clone(),
                    result,
                });
                result
            }
        }
    }

    // ========================================================================
    // Returns
    // ========================================================================

    /// Shared exit for returns leaving a protected region
    pub(crate) fn return_epilogue(&mut self) -> ReturnEpilogue {
        if let Some(epilogue) = self.body.return_epilogue {
            return epilogue;
        }
        let label = self.new_label();
        let slot = self.new_slot("$return".to_string(), ValueStorage::object(), None);
        let epilogue = ReturnEpilogue { label, slot };
        self.body.return_epilogue = Some(epilogue);
        epilogue
    }

    fn emit_return_epilogue(&mut self) {
        if let Some(epilogue) = self.body.return_epilogue {
            self.place_label(epilogue.label);
            let value = self.load_slot(epilogue.slot);
            self.emit(LirInstr::Return { value });
        }
    }

    /// Resumable bodies cannot keep a temp alive across a suspend point
    pub(crate) fn check_no_suspend<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e Expr>,
    ) -> LowerResult<()> {
        if !self.function.is_resumable() {
            return Ok(());
        }
        if exprs.into_iter().any(Expr::contains_suspend) {
            return unsupported("operand evaluated after a suspend point");
        }
        Ok(())
    }

    fn scope_name(&self, scope: ScopeId) -> String {
        self.scopes.scope(scope).name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{BinaryOp, BindingKind, ScopeKind};
    use crate::lir::PrettyPrint;

    fn lower(function: &HirFunction, scopes: &ScopeTree) -> MethodBody {
        let registry = ClassRegistry::new();
        let options = LoweringOptions::unoptimized();
        Lowerer::new(function, scopes, &registry, &options)
            .lower()
            .unwrap()
    }

    #[test]
    fn test_empty_main_creates_leaf_scope() {
        let scopes = ScopeTree::new("main");
        let main = HirFunction::new("main", FunctionKind::Main, scopes.global());
        let body = lower(&main, &scopes);
        assert_eq!(
            body.pretty_print(),
            "fn main {\n  leafscope main\n  t0 = const undefined\n  ret t0\n}\n"
        );
    }

    #[test]
    fn test_dynamic_add_fuses_into_number_conversion() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let a = scopes.add_parameter(f, "a", 0);
        let b = scopes.add_parameter(f, "b", 1);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        let sum = Expr::binary(BinaryOp::Add, Expr::var(a), Expr::var(b));
        function.body = vec![Stmt::Return(Some(Expr::binary(
            BinaryOp::Mul,
            sum,
            Expr::num(2.0),
        )))];

        let output = lower(&function, &scopes).pretty_print();
        assert!(output.contains("t2 = add.tonum t0, t1"));
        assert!(!output.contains("add.dyn"));
        assert!(output.contains("t4 = mul.num t2, t3"));
    }

    #[test]
    fn test_slot_written_twice_is_not_single_assignment() {
        let mut scopes = ScopeTree::new("main");
        let f = scopes.add_scope(scopes.global(), ScopeKind::Function, "f");
        let x = scopes.add_binding(f, "x", BindingKind::Let);
        let y = scopes.add_binding(f, "y", BindingKind::Const);
        let mut function = HirFunction::new("f", FunctionKind::Function, f);
        function.body = vec![
            Stmt::let_decl(x, Expr::num(1.0)),
            Stmt::expr(Expr::assign(x, Expr::num(2.0))),
            Stmt::const_decl(y, Expr::num(3.0)),
        ];

        let body = lower(&function, &scopes);
        assert_eq!(body.slots.len(), 2);
        assert!(!body.single_assignment_slots.contains(&SlotId(0)));
        assert!(body.single_assignment_slots.contains(&SlotId(1)));
    }
}
