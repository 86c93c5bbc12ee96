//! Pretty-printing for LIR
//!
//! Provides human-readable output for debugging and for test assertions.

use super::body::{MethodBody, RegionKind};
use super::instr::{LirInstr, NumericUnaryOp, ScopeSlotSource, SuspendKind};
use super::value::TempId;
use std::fmt;

/// Trait for pretty-printing LIR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

fn temps(list: &[TempId]) -> String {
    list.iter()
        .map(|temp| temp.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ScopeSlotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSlotSource::Leaf => write!(f, "leaf"),
            ScopeSlotSource::ScopesArgument(index) => write!(f, "arg{}", index),
            ScopeSlotSource::Temp(temp) => write!(f, "{}", temp),
        }
    }
}

impl fmt::Display for LirInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LirInstr::*;
        match self {
            ConstNumber { value, result } => write!(f, "{} = const {}", result, value),
            ConstString { value, result } => write!(f, "{} = const {:?}", result, value),
            ConstBool { value, result } => write!(f, "{} = const {}", result, value),
            ConstNull { result } => write!(f, "{} = const null", result),
            ConstUndefined { result } => write!(f, "{} = const undefined", result),
            CopyTemp { source, result } => write!(f, "{} = copy {}", result, source),
            LoadSlot { slot, result } => write!(f, "{} = load {}", result, slot),
            StoreSlot { slot, value } => write!(f, "store {}, {}", slot, value),
            LoadArgument { index, result } => write!(f, "{} = ldarg {}", result, index),
            StoreArgument { index, value } => write!(f, "starg {}, {}", index, value),
            LoadThis { result } => write!(f, "{} = this", result),
            LoadException { result } => write!(f, "{} = exception", result),

            CreateLeafScope { scope } => write!(f, "leafscope {}", scope),
            CreateScopeInstance { scope, result } => write!(f, "{} = newscope {}", result, scope),
            LoadLeafScopeField { field, result } => write!(f, "{} = ldleaf {}", result, field),
            StoreLeafScopeField { field, value } => write!(f, "stleaf {}, {}", field, value),
            LoadParentScopeField {
                index,
                field,
                result,
            } => write!(f, "{} = ldparent[{}] {}", result, index, field),
            StoreParentScopeField {
                index,
                field,
                value,
            } => write!(f, "stparent[{}] {}, {}", index, field, value),
            LoadScopeField {
                scope,
                field,
                result,
            } => write!(f, "{} = ldscope {}.{}", result, scope, field),
            StoreScopeField {
                scope,
                field,
                value,
            } => write!(f, "stscope {}.{}, {}", scope, field, value),
            BuildScopesArray { slots, result } => {
                let slots: Vec<String> = slots.iter().map(|slot| slot.to_string()).collect();
                write!(f, "{} = scopes [{}]", result, slots.join(", "))
            }

            ConvertToObject { source, result } => write!(f, "{} = to.object {}", result, source),
            ConvertToNumber { source, result } => write!(f, "{} = to.number {}", result, source),
            ConvertToBoolean { source, result } => write!(f, "{} = to.bool {}", result, source),
            IsTruthy { source, result } => write!(f, "{} = truthy {}", result, source),
            ConvertToString { source, result } => write!(f, "{} = to.string {}", result, source),
            TypeOf { value, result } => write!(f, "{} = typeof {}", result, value),
            IsNullOrUndefined { value, result } => write!(f, "{} = isnullish {}", result, value),
            IsUndefined { value, result } => write!(f, "{} = isundef {}", result, value),
            IsInstanceOf {
                value,
                class,
                result,
            } => write!(f, "{} = isinstance {}, {}", result, value, class),

            BinaryNumber {
                op,
                left,
                right,
                result,
            } => write!(f, "{} = {} {}, {}", result, op.mnemonic(), left, right),
            CompareNumber {
                op,
                left,
                right,
                result,
            } => write!(f, "{} = {} {}, {}", result, op.mnemonic(), left, right),
            UnaryNumber {
                op,
                operand,
                result,
            } => {
                let mnemonic = match op {
                    NumericUnaryOp::Neg => "neg.num",
                    NumericUnaryOp::BitNot => "bitnot.num",
                };
                write!(f, "{} = {} {}", result, mnemonic, operand)
            }
            NotBool { operand, result } => write!(f, "{} = not {}", result, operand),
            ConcatStrings {
                left,
                right,
                result,
            } => write!(f, "{} = concat {}, {}", result, left, right),
            AddDynamic {
                left,
                right,
                result,
            } => write!(f, "{} = add.dyn {}, {}", result, left, right),
            AddAndToNumber {
                left,
                right,
                result,
            } => write!(f, "{} = add.tonum {}, {}", result, left, right),
            BinaryDynamic {
                op,
                left,
                right,
                result,
            } => write!(f, "{} = {} {}, {}", result, op.mnemonic(), left, right),

            Label { label } => write!(f, "{}:", label),
            Branch { target } => write!(f, "br {}", target),
            BranchIfTrue { condition, target } => write!(f, "brtrue {}, {}", condition, target),
            BranchIfFalse { condition, target } => write!(f, "brfalse {}, {}", condition, target),
            Leave { target } => write!(f, "leave {}", target),
            EndFinally => write!(f, "endfinally"),
            Return { value } => write!(f, "ret {}", value),
            Throw { value } => write!(f, "throw {}", value),
            NewBuiltInError {
                kind,
                message,
                result,
            } => write!(f, "{} = error {} {:?}", result, kind.name(), message),

            ResumeDispatch { targets, start } => {
                let targets: Vec<String> = targets
                    .iter()
                    .map(|target| format!("{} -> {}", target.state, target.label))
                    .collect();
                write!(f, "dispatch [{}] else {}", targets.join(", "), start)
            }
            Suspend {
                kind,
                value,
                resume_state,
                resume_label,
                result,
                reject,
            } => {
                let verb = match kind {
                    SuspendKind::Await => "await",
                    SuspendKind::Yield => "yield",
                };
                write!(
                    f,
                    "{} = {} {} state {} -> {}",
                    result, verb, value, resume_state, resume_label
                )?;
                if let Some(reject) = reject {
                    write!(
                        f,
                        " reject {} via {}",
                        reject.resume_state, reject.pending_exception
                    )?;
                }
                Ok(())
            }
            AsyncReject { reason } => write!(f, "reject {}", reason),

            NewJsArray { elements, result } => {
                write!(f, "{} = newarray [{}]", result, temps(elements))
            }
            ArrayAdd { array, value } => write!(f, "array.add {}, {}", array, value),
            ArrayAddRange { array, iterable } => {
                write!(f, "array.addrange {}, {}", array, iterable)
            }
            BuildArray { elements, result } => write!(f, "{} = args [{}]", result, temps(elements)),
            NewJsObject { properties, result } => {
                let properties: Vec<String> = properties
                    .iter()
                    .map(|(name, temp)| format!("{}: {}", name, temp))
                    .collect();
                write!(f, "{} = newobject {{{}}}", result, properties.join(", "))
            }
            GetProperty {
                object,
                name,
                result,
            } => write!(f, "{} = getprop {}.{}", result, object, name),
            SetProperty {
                object,
                name,
                value,
            } => write!(f, "setprop {}.{}, {}", object, name, value),
            GetItem {
                object,
                key,
                result,
            } => write!(f, "{} = getitem {}[{}]", result, object, key),
            SetItem { object, key, value } => write!(f, "setitem {}[{}], {}", object, key, value),
            GetLength { object, result } => write!(f, "{} = length {}", result, object),
            GetArrayElement {
                array,
                index,
                result,
            } => write!(f, "{} = getelem {}[{}]", result, array, index),
            LoadUserClassInstanceField {
                receiver,
                class,
                field,
                result,
            } => write!(f, "{} = ldfld {}.{}::{}", result, receiver, class, field),
            StoreUserClassInstanceField {
                receiver,
                class,
                field,
                field_type,
                value,
            } => {
                write!(f, "stfld {}.{}::{}, {}", receiver, class, field, value)?;
                if let Some(ty) = field_type {
                    write!(f, " : {}", ty)?;
                }
                Ok(())
            }
            NormalizeIterable { source, result } => {
                write!(f, "{} = normalize.iter {}", result, source)
            }
            GetIntrinsicGlobal { name, result } => write!(f, "{} = global {}", result, name),
            GetUserClassType { class, result } => write!(f, "{} = classtype {}", result, class),

            CallFunction {
                callable,
                scopes,
                args,
                result,
            } => write!(
                f,
                "{} = call {}({}) scopes {}",
                result,
                callable,
                temps(args),
                scopes
            ),
            CallFunctionValue {
                function,
                scopes,
                args,
                result,
            } => write!(
                f,
                "{} = call.value {}({}) scopes {}",
                result,
                function,
                temps(args),
                scopes
            ),
            CallFunctionValueWithArray {
                function,
                scopes,
                args_array,
                result,
            } => write!(
                f,
                "{} = call.value {}(...{}) scopes {}",
                result, function, args_array, scopes
            ),
            CallMethodValue {
                function,
                receiver,
                scopes,
                args_array,
                result,
            } => write!(
                f,
                "{} = call.method {}(...{}) this {} scopes {}",
                result, function, args_array, receiver, scopes
            ),
            CallMember {
                receiver,
                name,
                args_array,
                result,
            } => write!(
                f,
                "{} = call.member {}.{}(...{})",
                result, receiver, name, args_array
            ),
            CallMemberFixed {
                receiver,
                name,
                args,
                result,
            } => write!(
                f,
                "{} = call.member {}.{}({})",
                result,
                receiver,
                name,
                temps(args)
            ),
            CallTypedMember {
                class,
                name,
                receiver,
                args,
                result,
                ..
            } => write!(
                f,
                "{} = call.typed {}::{} {}({})",
                result,
                class,
                name,
                receiver,
                temps(args)
            ),
            CallTypedMemberWithFallback {
                class,
                name,
                receiver,
                args,
                result,
                ..
            } => write!(
                f,
                "{} = call.typed.fallback {}::{} {}({})",
                result,
                class,
                name,
                receiver,
                temps(args)
            ),
            CallUserClassStaticMethod {
                class,
                name,
                args,
                result,
                ..
            } => write!(
                f,
                "{} = call.static {}::{}({})",
                result,
                class,
                name,
                temps(args)
            ),
            CallSuperConstructor { class, args } => {
                write!(f, "call.super {}({})", class, temps(args))
            }
            CallIntrinsicGlobal { name, args, result } => {
                write!(f, "{} = call.global {}({})", result, name, temps(args))
            }
            CallIntrinsicMember {
                intrinsic,
                method,
                args,
                result,
            } => write!(
                f,
                "{} = call.intrinsic {}.{}({})",
                result,
                intrinsic,
                method,
                temps(args)
            ),
            CallRuntime {
                helper,
                args,
                result,
            } => write!(
                f,
                "{} = call.runtime {}({})",
                result,
                helper.name(),
                temps(args)
            ),
            CreateBoundFunction {
                callable,
                scopes,
                is_arrow,
                result,
            } => {
                let verb = if *is_arrow { "arrow" } else { "closure" };
                write!(f, "{} = {} {} scopes {}", result, verb, callable, scopes)
            }
            NewUserClass {
                class,
                args,
                result,
            } => write!(f, "{} = new {}({})", result, class, temps(args)),
            NewIntrinsic {
                intrinsic,
                args,
                result,
            } => write!(f, "{} = new.intrinsic {}({})", result, intrinsic, temps(args)),
            NewFromValue {
                constructor,
                args_array,
                result,
            } => write!(f, "{} = new.value {}(...{})", result, constructor, args_array),
        }
    }
}

impl PrettyPrint for MethodBody {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let flavor = match (self.is_async, self.is_generator) {
            (true, true) => "async generator ",
            (true, false) => "async ",
            (false, true) => "generator ",
            (false, false) => "",
        };
        output.push_str(&format!("{}fn {} {{\n", flavor, self.name));

        if !self.slots.is_empty() {
            let slots: Vec<String> = self
                .slots
                .iter()
                .enumerate()
                .map(|(index, slot)| format!("v{} {}: {}", index, slot.name, slot.storage))
                .collect();
            output.push_str(&format!("  ; slots: {}\n", slots.join(", ")));
        }

        for instr in &self.instructions {
            match instr {
                LirInstr::Label { .. } => output.push_str(&format!("{}\n", instr)),
                _ => output.push_str(&format!("  {}\n", instr)),
            }
        }

        for region in &self.exception_regions {
            let kind = match region.kind {
                RegionKind::Catch => "catch",
                RegionKind::Finally => "finally",
            };
            output.push_str(&format!(
                "  ; {} region {}..{} handler {}..{}\n",
                kind, region.try_start, region.try_end, region.handler_start, region.handler_end
            ));
        }

        output.push_str("}\n");
        output
    }
}
