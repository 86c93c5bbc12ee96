//! Type Normalization
//!
//! Peepholes that tighten storage after lowering:
//! - a value boxed only to be stored into a typed field is stored unboxed
//! - the result of `new C(...)` is typed as a reference to `C`
//! - normalizing an iterable that is already an array is a copy
//! - anonymous slots that are never loaded are dropped with their stores

use crate::lir::{LirInstr, MethodBody, SlotId, StorageKind, ValueStorage, ValueType};

/// Type normalization pass
pub struct TypeNormalizer;

impl TypeNormalizer {
    /// Create a new type normalization pass
    pub fn new() -> Self {
        Self
    }

    /// Run over one body; returns the number of rewrites
    pub fn run(&self, body: &mut MethodBody) -> usize {
        self.type_constructions(body)
            + self.unbox_field_stores(body)
            + self.copy_arrays(body)
            + self.compact_slots(body)
    }

    fn type_constructions(&self, body: &mut MethodBody) -> usize {
        let mut rewritten = 0;
        for instr in &body.instructions {
            if let LirInstr::NewUserClass { class, result, .. } = instr {
                let typed = ValueStorage::reference(ValueType::UserClass(class.clone()));
                if let Some(entry) = body.temps.get_mut(result.index()) {
                    if entry.as_ref() != Some(&typed) {
                        *entry = Some(typed);
                        rewritten += 1;
                    }
                }
            }
        }
        rewritten
    }

    /// `t1 = box t0; stfld o.C::f, t1` with `f` typed like `t0` and `t1` used once
    fn unbox_field_stores(&self, body: &mut MethodBody) -> usize {
        let uses = body.use_counts();
        let mut removed = vec![false; body.instructions.len()];
        let mut rewritten = 0;

        for index in 1..body.instructions.len() {
            let LirInstr::ConvertToObject { source, result } = body.instructions[index - 1] else {
                continue;
            };
            let source_storage = body.storage_of(source);
            if source_storage.kind != StorageKind::UnboxedPrimitive
                || uses.get(result.index()) != Some(&1)
            {
                continue;
            }
            if let LirInstr::StoreUserClassInstanceField {
                field_type: Some(ty),
                value,
                ..
            } = &mut body.instructions[index]
            {
                if *value == result && ValueStorage::for_type(ty) == source_storage {
                    *value = source;
                    removed[index - 1] = true;
                    rewritten += 1;
                }
            }
        }

        if rewritten > 0 {
            let mut flags = removed.into_iter();
            body.instructions
                .retain(|_| !flags.next().unwrap_or(false));
        }
        rewritten
    }

    fn copy_arrays(&self, body: &mut MethodBody) -> usize {
        let mut rewritten = 0;
        for index in 0..body.instructions.len() {
            let LirInstr::NormalizeIterable { source, result } = body.instructions[index] else {
                continue;
            };
            if body.storage_of(source) == ValueStorage::reference(ValueType::Array) {
                body.instructions[index] = LirInstr::CopyTemp { source, result };
                rewritten += 1;
            }
        }
        rewritten
    }

    fn compact_slots(&self, body: &mut MethodBody) -> usize {
        let mut loaded = vec![false; body.slots.len()];
        for instr in &body.instructions {
            if let LirInstr::LoadSlot { slot, .. } = instr {
                if let Some(flag) = loaded.get_mut(slot.index()) {
                    *flag = true;
                }
            }
        }
        if let Some(epilogue) = body.return_epilogue {
            if let Some(flag) = loaded.get_mut(epilogue.slot.index()) {
                *flag = true;
            }
        }

        // new index of every kept slot
        let mut remap = Vec::with_capacity(body.slots.len());
        let mut next = 0u32;
        for (slot, was_loaded) in body.slots.iter().zip(&loaded) {
            if slot.is_anonymous() && !was_loaded {
                remap.push(None);
            } else {
                remap.push(Some(SlotId(next)));
                next += 1;
            }
        }
        let dropped = remap.iter().filter(|entry| entry.is_none()).count();
        if dropped == 0 {
            return 0;
        }

        let renumber = |slot: SlotId| remap.get(slot.index()).copied().flatten();
        body.instructions.retain_mut(|instr| match instr {
            LirInstr::StoreSlot { slot, .. } | LirInstr::LoadSlot { slot, .. } => {
                match renumber(*slot) {
                    Some(new) => {
                        *slot = new;
                        true
                    }
                    None => false,
                }
            }
            _ => true,
        });
        body.single_assignment_slots = body
            .single_assignment_slots
            .iter()
            .filter_map(|slot| renumber(*slot))
            .collect();
        if let Some(epilogue) = body.return_epilogue.as_mut() {
            if let Some(new) = renumber(epilogue.slot) {
                epilogue.slot = new;
            }
        }

        let mut flags = remap.iter().map(Option::is_some);
        body.slots.retain(|_| flags.next().unwrap_or(true));
        dropped
    }
}

impl Default for TypeNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
