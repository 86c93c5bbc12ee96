//! LIR Instructions
//!
//! Flat instruction forms produced by lowering. Every instruction defines at most one
//! temp ([`LirInstr::result`]) and declares every temp it reads ([`LirInstr::used_temps`]).

use super::value::{CallableId, FieldRef, LabelId, SlotId, TempId, ValueType};
use serde::Serialize;

/// Native numeric operators on unboxed doubles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumericOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl NumericOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            NumericOp::Add => "add.num",
            NumericOp::Sub => "sub.num",
            NumericOp::Mul => "mul.num",
            NumericOp::Div => "div.num",
            NumericOp::Mod => "mod.num",
            NumericOp::Exp => "exp.num",
            NumericOp::BitAnd => "and.num",
            NumericOp::BitOr => "or.num",
            NumericOp::BitXor => "xor.num",
            NumericOp::Shl => "shl.num",
            NumericOp::Shr => "shr.num",
            NumericOp::UShr => "ushr.num",
        }
    }
}

/// Native numeric comparisons producing an unboxed bool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CompareOp::Lt => "lt.num",
            CompareOp::Le => "le.num",
            CompareOp::Gt => "gt.num",
            CompareOp::Ge => "ge.num",
            CompareOp::Eq => "eq.num",
            CompareOp::Ne => "ne.num",
        }
    }
}

/// Operators dispatched by the runtime on arbitrary values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DynamicOp {
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    InstanceOf,
    In,
}

impl DynamicOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            DynamicOp::LooseEq => "eq.dyn",
            DynamicOp::LooseNe => "ne.dyn",
            DynamicOp::StrictEq => "seq.dyn",
            DynamicOp::StrictNe => "sne.dyn",
            DynamicOp::Lt => "lt.dyn",
            DynamicOp::Le => "le.dyn",
            DynamicOp::Gt => "gt.dyn",
            DynamicOp::Ge => "ge.dyn",
            DynamicOp::InstanceOf => "instanceof.dyn",
            DynamicOp::In => "in.dyn",
        }
    }
}

/// Unary operators on unboxed doubles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumericUnaryOp {
    Neg,
    BitNot,
}

/// Built-in error constructors used for statically detected JavaScript errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltInError {
    TypeError,
    ReferenceError,
}

impl BuiltInError {
    pub fn name(self) -> &'static str {
        match self {
            BuiltInError::TypeError => "TypeError",
            BuiltInError::ReferenceError => "ReferenceError",
        }
    }
}

/// Runtime support helpers implementing language protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuntimeHelper {
    GetIterator,
    IteratorNext,
    IteratorResultDone,
    IteratorResultValue,
    IteratorClose,
    /// Enumerable string keys of an object, as an array (for-in)
    EnumerateKeys,
    /// Copy of an object without the listed keys (object rest)
    ObjectRest,
    /// Copy own enumerable properties into a target (object spread)
    ObjectAssign,
}

impl RuntimeHelper {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeHelper::GetIterator => "GetIterator",
            RuntimeHelper::IteratorNext => "IteratorNext",
            RuntimeHelper::IteratorResultDone => "IteratorResultDone",
            RuntimeHelper::IteratorResultValue => "IteratorResultValue",
            RuntimeHelper::IteratorClose => "IteratorClose",
            RuntimeHelper::EnumerateKeys => "EnumerateKeys",
            RuntimeHelper::ObjectRest => "ObjectRest",
            RuntimeHelper::ObjectAssign => "ObjectAssign",
        }
    }
}

/// What a suspend point waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SuspendKind {
    Await,
    Yield,
}

/// Where a rejected await resumes when it sits inside a routed try region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwaitReject {
    /// Resume state entered on rejection
    pub resume_state: u32,
    /// Capture-object field receiving the rejection reason
    pub pending_exception: FieldRef,
}

/// One entry of a resume dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateLabel {
    pub state: u32,
    pub label: LabelId,
}

/// Source of one element of a scope-chain array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeSlotSource {
    /// The current function's own capture object
    Leaf,
    /// An element of the scope-chain array the current function received
    ScopesArgument(usize),
    /// A capture object held in a temp (active block scope)
    Temp(TempId),
}

/// LIR instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LirInstr {
    // ===== Constants and moves =====
    ConstNumber {
        value: f64,
        result: TempId,
    },
    ConstString {
        value: String,
        result: TempId,
    },
    ConstBool {
        value: bool,
        result: TempId,
    },
    ConstNull {
        result: TempId,
    },
    ConstUndefined {
        result: TempId,
    },
    /// result = source (storage is preserved)
    CopyTemp {
        source: TempId,
        result: TempId,
    },
    LoadSlot {
        slot: SlotId,
        result: TempId,
    },
    StoreSlot {
        slot: SlotId,
        value: TempId,
    },
    LoadArgument {
        index: u16,
        result: TempId,
    },
    StoreArgument {
        index: u16,
        value: TempId,
    },
    LoadThis {
        result: TempId,
    },
    /// Exception object on entry to a catch handler
    LoadException {
        result: TempId,
    },

    // ===== Capture objects =====
    /// Allocate the current function's own capture object
    CreateLeafScope {
        scope: String,
    },
    /// Allocate a block capture object
    CreateScopeInstance {
        scope: String,
        result: TempId,
    },
    LoadLeafScopeField {
        field: FieldRef,
        result: TempId,
    },
    StoreLeafScopeField {
        field: FieldRef,
        value: TempId,
    },
    /// Field of an ancestor capture object at `index` in the received scope-chain array
    LoadParentScopeField {
        index: usize,
        field: FieldRef,
        result: TempId,
    },
    StoreParentScopeField {
        index: usize,
        field: FieldRef,
        value: TempId,
    },
    LoadScopeField {
        scope: TempId,
        field: FieldRef,
        result: TempId,
    },
    StoreScopeField {
        scope: TempId,
        field: FieldRef,
        value: TempId,
    },
    BuildScopesArray {
        slots: Vec<ScopeSlotSource>,
        result: TempId,
    },

    // ===== Coercions and tests =====
    ConvertToObject {
        source: TempId,
        result: TempId,
    },
    ConvertToNumber {
        source: TempId,
        result: TempId,
    },
    /// ToBoolean of an unboxed primitive
    ConvertToBoolean {
        source: TempId,
        result: TempId,
    },
    /// ToBoolean of an arbitrary value
    IsTruthy {
        source: TempId,
        result: TempId,
    },
    ConvertToString {
        source: TempId,
        result: TempId,
    },
    TypeOf {
        value: TempId,
        result: TempId,
    },
    IsNullOrUndefined {
        value: TempId,
        result: TempId,
    },
    IsUndefined {
        value: TempId,
        result: TempId,
    },
    /// Runtime type test against an intrinsic or user class
    IsInstanceOf {
        value: TempId,
        class: String,
        result: TempId,
    },

    // ===== Operators =====
    BinaryNumber {
        op: NumericOp,
        left: TempId,
        right: TempId,
        result: TempId,
    },
    CompareNumber {
        op: CompareOp,
        left: TempId,
        right: TempId,
        result: TempId,
    },
    UnaryNumber {
        op: NumericUnaryOp,
        operand: TempId,
        result: TempId,
    },
    NotBool {
        operand: TempId,
        result: TempId,
    },
    ConcatStrings {
        left: TempId,
        right: TempId,
        result: TempId,
    },
    /// JavaScript `+` on arbitrary values
    AddDynamic {
        left: TempId,
        right: TempId,
        result: TempId,
    },
    /// ToNumber(left + right) in one step
    AddAndToNumber {
        left: TempId,
        right: TempId,
        result: TempId,
    },
    BinaryDynamic {
        op: DynamicOp,
        left: TempId,
        right: TempId,
        result: TempId,
    },

    // ===== Control flow =====
    Label {
        label: LabelId,
    },
    Branch {
        target: LabelId,
    },
    BranchIfTrue {
        condition: TempId,
        target: LabelId,
    },
    BranchIfFalse {
        condition: TempId,
        target: LabelId,
    },
    /// Structured exit from a protected region
    Leave {
        target: LabelId,
    },
    EndFinally,
    Return {
        value: TempId,
    },
    Throw {
        value: TempId,
    },
    NewBuiltInError {
        kind: BuiltInError,
        message: String,
        result: TempId,
    },

    // ===== Resumable functions =====
    /// Entry dispatch: jump to the label registered for the current resume state
    ResumeDispatch {
        targets: Vec<StateLabel>,
        start: LabelId,
    },
    /// Record the resume state, hand `value` to the driver and return; re-entry
    /// continues at `resume_label` with `result` defined
    Suspend {
        kind: SuspendKind,
        value: TempId,
        resume_state: u32,
        resume_label: LabelId,
        result: TempId,
        reject: Option<AwaitReject>,
    },
    /// Reject the async function's promise and finish
    AsyncReject {
        reason: TempId,
    },

    // ===== Arrays, objects, members =====
    NewJsArray {
        elements: Vec<TempId>,
        result: TempId,
    },
    ArrayAdd {
        array: TempId,
        value: TempId,
    },
    ArrayAddRange {
        array: TempId,
        iterable: TempId,
    },
    /// Fixed-size argument array
    BuildArray {
        elements: Vec<TempId>,
        result: TempId,
    },
    NewJsObject {
        properties: Vec<(String, TempId)>,
        result: TempId,
    },
    GetProperty {
        object: TempId,
        name: String,
        result: TempId,
    },
    SetProperty {
        object: TempId,
        name: String,
        value: TempId,
    },
    GetItem {
        object: TempId,
        key: TempId,
        result: TempId,
    },
    SetItem {
        object: TempId,
        key: TempId,
        value: TempId,
    },
    GetLength {
        object: TempId,
        result: TempId,
    },
    /// Intrinsic array element by unboxed numeric index
    GetArrayElement {
        array: TempId,
        index: TempId,
        result: TempId,
    },
    LoadUserClassInstanceField {
        receiver: TempId,
        class: String,
        field: String,
        result: TempId,
    },
    StoreUserClassInstanceField {
        receiver: TempId,
        class: String,
        field: String,
        field_type: Option<ValueType>,
        value: TempId,
    },
    /// Array-like view of an iterable for indexed walks
    NormalizeIterable {
        source: TempId,
        result: TempId,
    },
    GetIntrinsicGlobal {
        name: String,
        result: TempId,
    },
    GetUserClassType {
        class: String,
        result: TempId,
    },

    // ===== Calls =====
    CallFunction {
        callable: CallableId,
        scopes: TempId,
        args: Vec<TempId>,
        result: TempId,
    },
    /// Dynamic call with at most three plain arguments
    CallFunctionValue {
        function: TempId,
        scopes: TempId,
        args: Vec<TempId>,
        result: TempId,
    },
    CallFunctionValueWithArray {
        function: TempId,
        scopes: TempId,
        args_array: TempId,
        result: TempId,
    },
    /// Call of a method value already read from `receiver`, with `receiver` as `this`
    CallMethodValue {
        function: TempId,
        receiver: TempId,
        scopes: TempId,
        args_array: TempId,
        result: TempId,
    },
    CallMember {
        receiver: TempId,
        name: String,
        args_array: TempId,
        result: TempId,
    },
    /// Dynamic member call with at most three plain arguments
    CallMemberFixed {
        receiver: TempId,
        name: String,
        args: Vec<TempId>,
        result: TempId,
    },
    /// Early-bound instance method call
    CallTypedMember {
        class: String,
        name: String,
        callable: CallableId,
        receiver: TempId,
        args: Vec<TempId>,
        result: TempId,
    },
    /// Early-bound call guarded by a receiver type test, dynamic dispatch otherwise
    CallTypedMemberWithFallback {
        class: String,
        name: String,
        callable: CallableId,
        receiver: TempId,
        args: Vec<TempId>,
        result: TempId,
    },
    CallUserClassStaticMethod {
        class: String,
        name: String,
        callable: CallableId,
        args: Vec<TempId>,
        result: TempId,
    },
    CallSuperConstructor {
        class: String,
        args: Vec<TempId>,
    },
    CallIntrinsicGlobal {
        name: String,
        args: Vec<TempId>,
        result: TempId,
    },
    CallIntrinsicMember {
        intrinsic: String,
        method: String,
        args: Vec<TempId>,
        result: TempId,
    },
    CallRuntime {
        helper: RuntimeHelper,
        args: Vec<TempId>,
        result: TempId,
    },
    CreateBoundFunction {
        callable: CallableId,
        scopes: TempId,
        is_arrow: bool,
        result: TempId,
    },
    NewUserClass {
        class: String,
        args: Vec<TempId>,
        result: TempId,
    },
    NewIntrinsic {
        intrinsic: String,
        args: Vec<TempId>,
        result: TempId,
    },
    NewFromValue {
        constructor: TempId,
        args_array: TempId,
        result: TempId,
    },
}

impl LirInstr {
    /// The temp this instruction defines, if any
    pub fn result(&self) -> Option<TempId> {
        use LirInstr::*;
        match self {
            ConstNumber { result, .. }
            | ConstString { result, .. }
            | ConstBool { result, .. }
            | ConstNull { result }
            | ConstUndefined { result }
            | CopyTemp { result, .. }
            | LoadSlot { result, .. }
            | LoadArgument { result, .. }
            | LoadThis { result }
            | LoadException { result }
            | CreateScopeInstance { result, .. }
            | LoadLeafScopeField { result, .. }
            | LoadParentScopeField { result, .. }
            | LoadScopeField { result, .. }
            | BuildScopesArray { result, .. }
            | ConvertToObject { result, .. }
            | ConvertToNumber { result, .. }
            | ConvertToBoolean { result, .. }
            | IsTruthy { result, .. }
            | ConvertToString { result, .. }
            | TypeOf { result, .. }
            | IsNullOrUndefined { result, .. }
            | IsUndefined { result, .. }
            | IsInstanceOf { result, .. }
            | BinaryNumber { result, .. }
            | CompareNumber { result, .. }
            | UnaryNumber { result, .. }
            | NotBool { result, .. }
            | ConcatStrings { result, .. }
            | AddDynamic { result, .. }
            | AddAndToNumber { result, .. }
            | BinaryDynamic { result, .. }
            | NewBuiltInError { result, .. }
            | Suspend { result, .. }
            | NewJsArray { result, .. }
            | BuildArray { result, .. }
            | NewJsObject { result, .. }
            | GetProperty { result, .. }
            | GetItem { result, .. }
            | GetLength { result, .. }
            | GetArrayElement { result, .. }
            | LoadUserClassInstanceField { result, .. }
            | NormalizeIterable { result, .. }
            | GetIntrinsicGlobal { result, .. }
            | GetUserClassType { result, .. }
            | CallFunction { result, .. }
            | CallFunctionValue { result, .. }
            | CallFunctionValueWithArray { result, .. }
            | CallMethodValue { result, .. }
            | CallMember { result, .. }
            | CallMemberFixed { result, .. }
            | CallTypedMember { result, .. }
            | CallTypedMemberWithFallback { result, .. }
            | CallUserClassStaticMethod { result, .. }
            | CallIntrinsicGlobal { result, .. }
            | CallIntrinsicMember { result, .. }
            | CallRuntime { result, .. }
            | CreateBoundFunction { result, .. }
            | NewUserClass { result, .. }
            | NewIntrinsic { result, .. }
            | NewFromValue { result, .. } => Some(*result),

            StoreSlot { .. }
            | StoreArgument { .. }
            | CreateLeafScope { .. }
            | StoreLeafScopeField { .. }
            | StoreParentScopeField { .. }
            | StoreScopeField { .. }
            | Label { .. }
            | Branch { .. }
            | BranchIfTrue { .. }
            | BranchIfFalse { .. }
            | Leave { .. }
            | EndFinally
            | Return { .. }
            | Throw { .. }
            | ResumeDispatch { .. }
            | AsyncReject { .. }
            | ArrayAdd { .. }
            | ArrayAddRange { .. }
            | SetProperty { .. }
            | SetItem { .. }
            | StoreUserClassInstanceField { .. }
            | CallSuperConstructor { .. } => None,
        }
    }

    /// Every temp this instruction reads, in operand order
    pub fn used_temps(&self) -> Vec<TempId> {
        use LirInstr::*;
        match self {
            ConstNumber { .. }
            | ConstString { .. }
            | ConstBool { .. }
            | ConstNull { .. }
            | ConstUndefined { .. }
            | LoadSlot { .. }
            | LoadArgument { .. }
            | LoadThis { .. }
            | LoadException { .. }
            | CreateLeafScope { .. }
            | CreateScopeInstance { .. }
            | LoadLeafScopeField { .. }
            | LoadParentScopeField { .. }
            | Label { .. }
            | Branch { .. }
            | Leave { .. }
            | EndFinally
            | NewBuiltInError { .. }
            | ResumeDispatch { .. }
            | GetIntrinsicGlobal { .. }
            | GetUserClassType { .. } => Vec::new(),

            CopyTemp { source, .. }
            | ConvertToObject { source, .. }
            | ConvertToNumber { source, .. }
            | ConvertToBoolean { source, .. }
            | IsTruthy { source, .. }
            | ConvertToString { source, .. }
            | NormalizeIterable { source, .. } => vec![*source],

            StoreSlot { value, .. }
            | StoreArgument { value, .. }
            | StoreLeafScopeField { value, .. }
            | StoreParentScopeField { value, .. }
            | TypeOf { value, .. }
            | IsNullOrUndefined { value, .. }
            | IsUndefined { value, .. }
            | IsInstanceOf { value, .. }
            | Return { value }
            | Throw { value }
            | Suspend { value, .. } => vec![*value],

            LoadScopeField { scope, .. } => vec![*scope],
            StoreScopeField { scope, value, .. } => vec![*scope, *value],
            BuildScopesArray { slots, .. } => slots
                .iter()
                .filter_map(|slot| match slot {
                    ScopeSlotSource::Temp(temp) => Some(*temp),
                    ScopeSlotSource::Leaf | ScopeSlotSource::ScopesArgument(_) => None,
                })
                .collect(),

            BinaryNumber { left, right, .. }
            | CompareNumber { left, right, .. }
            | ConcatStrings { left, right, .. }
            | AddDynamic { left, right, .. }
            | AddAndToNumber { left, right, .. }
            | BinaryDynamic { left, right, .. } => vec![*left, *right],
            UnaryNumber { operand, .. } | NotBool { operand, .. } => vec![*operand],

            BranchIfTrue { condition, .. } | BranchIfFalse { condition, .. } => vec![*condition],
            AsyncReject { reason } => vec![*reason],

            NewJsArray { elements, .. } | BuildArray { elements, .. } => elements.clone(),
            ArrayAdd { array, value } => vec![*array, *value],
            ArrayAddRange { array, iterable } => vec![*array, *iterable],
            NewJsObject { properties, .. } => properties.iter().map(|(_, temp)| *temp).collect(),
            GetProperty { object, .. } | GetLength { object, .. } => vec![*object],
            SetProperty { object, value, .. } => vec![*object, *value],
            GetItem { object, key, .. } => vec![*object, *key],
            SetItem { object, key, value } => vec![*object, *key, *value],
            GetArrayElement { array, index, .. } => vec![*array, *index],
            LoadUserClassInstanceField { receiver, .. } => vec![*receiver],
            StoreUserClassInstanceField {
                receiver, value, ..
            } => vec![*receiver, *value],

            CallFunction { scopes, args, .. } => {
                let mut temps = vec![*scopes];
                temps.extend(args.iter().copied());
                temps
            }
            CallFunctionValue {
                function,
                scopes,
                args,
                ..
            } => {
                let mut temps = vec![*function, *scopes];
                temps.extend(args.iter().copied());
                temps
            }
            CallFunctionValueWithArray {
                function,
                scopes,
                args_array,
                ..
            } => vec![*function, *scopes, *args_array],
            CallMethodValue {
                function,
                receiver,
                scopes,
                args_array,
                ..
            } => vec![*function, *receiver, *scopes, *args_array],
            CallMember {
                receiver,
                args_array,
                ..
            } => vec![*receiver, *args_array],
            CallMemberFixed { receiver, args, .. }
            | CallTypedMember { receiver, args, .. }
            | CallTypedMemberWithFallback { receiver, args, .. } => {
                let mut temps = vec![*receiver];
                temps.extend(args.iter().copied());
                temps
            }
            CallUserClassStaticMethod { args, .. }
            | CallSuperConstructor { args, .. }
            | CallIntrinsicGlobal { args, .. }
            | CallIntrinsicMember { args, .. }
            | CallRuntime { args, .. }
            | NewUserClass { args, .. }
            | NewIntrinsic { args, .. } => args.clone(),
            CreateBoundFunction { scopes, .. } => vec![*scopes],
            NewFromValue {
                constructor,
                args_array,
                ..
            } => vec![*constructor, *args_array],
        }
    }

    /// Branch-like instructions whose target is a label
    pub fn branch_target(&self) -> Option<LabelId> {
        match self {
            LirInstr::Branch { target }
            | LirInstr::BranchIfTrue { target, .. }
            | LirInstr::BranchIfFalse { target, .. }
            | LirInstr::Leave { target } => Some(*target),
            _ => None,
        }
    }

    /// Instructions that may be calls into user code
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            LirInstr::CallFunction { .. }
                | LirInstr::CallFunctionValue { .. }
                | LirInstr::CallFunctionValueWithArray { .. }
                | LirInstr::CallMethodValue { .. }
                | LirInstr::CallMember { .. }
                | LirInstr::CallMemberFixed { .. }
                | LirInstr::CallTypedMember { .. }
                | LirInstr::CallTypedMemberWithFallback { .. }
                | LirInstr::CallUserClassStaticMethod { .. }
                | LirInstr::CallSuperConstructor { .. }
                | LirInstr::CallIntrinsicGlobal { .. }
                | LirInstr::CallIntrinsicMember { .. }
        )
    }

    /// Boxing or unboxing step
    pub fn is_coercion(&self) -> bool {
        matches!(
            self,
            LirInstr::ConvertToObject { .. }
                | LirInstr::ConvertToNumber { .. }
                | LirInstr::ConvertToBoolean { .. }
                | LirInstr::IsTruthy { .. }
                | LirInstr::ConvertToString { .. }
        )
    }
}
