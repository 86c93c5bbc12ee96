//! Member Call Normalization
//!
//! Upgrades dynamic member calls on receivers whose user class is known. The method
//! must be the only instance method with that name and arity in the registry. A
//! receiver of exactly the declaring class gets a direct call; a receiver of a
//! subclass gets a guarded call that falls back to dynamic dispatch.
//!
//! Receiver classes are known from class-typed temps (constructions, typed field
//! loads) and flow through copies and through slots written exactly once.

use crate::hir::ClassRegistry;
use crate::lir::{CallableId, LirInstr, MethodBody, SlotId, StorageKind, TempId, ValueType};
use rustc_hash::FxHashMap;

/// Early-bound target of a member call
struct Target {
    class: String,
    callable: CallableId,
    exact: bool,
}

/// Member call normalization pass
pub struct MemberCallNormalizer<'a> {
    registry: &'a ClassRegistry,
}

impl<'a> MemberCallNormalizer<'a> {
    /// Create a new pass over the given class registry
    pub fn new(registry: &'a ClassRegistry) -> Self {
        Self { registry }
    }

    /// Run over one body; returns the number of calls rewritten
    pub fn run(&self, body: &mut MethodBody) -> usize {
        let classes = receiver_classes(body);
        let uses = body.use_counts();
        let array_defs: Vec<Option<usize>> = {
            let mut defs = vec![None; body.temps.len()];
            for (index, instr) in body.instructions.iter().enumerate() {
                if let LirInstr::BuildArray { result, .. } = instr {
                    if let Some(def) = defs.get_mut(result.index()) {
                        *def = Some(index);
                    }
                }
            }
            defs
        };

        let mut removed = vec![false; body.instructions.len()];
        let mut rewritten = 0;

        for index in 0..body.instructions.len() {
            let (receiver, name, args, result, array_def) = match &body.instructions[index] {
                LirInstr::CallMemberFixed {
                    receiver,
                    name,
                    args,
                    result,
                } => (*receiver, name.clone(), args.clone(), *result, None),
                LirInstr::CallMember {
                    receiver,
                    name,
                    args_array,
                    result,
                } => {
                    // the argument array must be a fixed build read only by this call
                    let Some(def) = array_defs.get(args_array.index()).copied().flatten() else {
                        continue;
                    };
                    if uses.get(args_array.index()) != Some(&1) {
                        continue;
                    }
                    let LirInstr::BuildArray { elements, .. } = &body.instructions[def] else {
                        continue;
                    };
                    (*receiver, name.clone(), elements.clone(), *result, Some(def))
                }
                _ => continue,
            };

            let Some(class) = classes.get(receiver.index()).cloned().flatten() else {
                continue;
            };
            let Some(target) = self.resolve(&class, &name, args.len()) else {
                continue;
            };
            if let Some(def) = array_def {
                removed[def] = true;
            }

            body.instructions[index] = if target.exact {
                LirInstr::CallTypedMember {
                    class: target.class,
                    name,
                    callable: target.callable,
                    receiver,
                    args,
                    result,
                }
            } else {
                LirInstr::CallTypedMemberWithFallback {
                    class: target.class,
                    name,
                    callable: target.callable,
                    receiver,
                    args,
                    result,
                }
            };
            rewritten += 1;
        }

        if removed.iter().any(|&flag| flag) {
            let mut flags = removed.into_iter();
            body.instructions
                .retain(|_| !flags.next().unwrap_or(false));
        }
        rewritten
    }

    fn resolve(&self, class: &str, name: &str, arity: usize) -> Option<Target> {
        let (declaring, method) = self.registry.unique_instance_method(name, arity)?;
        if !self.registry.is_subclass_of(class, &declaring.name) {
            return None;
        }
        Some(Target {
            class: declaring.name.clone(),
            callable: method.callable.clone(),
            exact: declaring.name == class,
        })
    }
}

/// User class of every temp whose receiver class is known, indexed by temp.
///
/// One forward walk in instruction order: a slot only carries a class when its single
/// store has already been seen, so a load placed before the store stays unknown.
fn receiver_classes(body: &MethodBody) -> Vec<Option<String>> {
    let mut classes: Vec<Option<String>> = body
        .temps
        .iter()
        .map(|storage| match storage {
            Some(storage) if storage.kind == StorageKind::ObjectReference => match &storage.ty {
                ValueType::UserClass(class) => Some(class.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let mut slot_classes: FxHashMap<SlotId, String> = FxHashMap::default();

    fn set(classes: &mut [Option<String>], temp: TempId, class: String) {
        if let Some(entry) = classes.get_mut(temp.index()) {
            *entry = Some(class);
        }
    }
    for instr in &body.instructions {
        match instr {
            LirInstr::NewUserClass { class, result, .. } => {
                set(&mut classes, *result, class.clone());
            }
            LirInstr::CopyTemp { source, result } => {
                if let Some(class) = classes.get(source.index()).cloned().flatten() {
                    set(&mut classes, *result, class);
                }
            }
            LirInstr::StoreSlot { slot, value } => {
                if !body.single_assignment_slots.contains(slot) {
                    continue;
                }
                if let Some(class) = classes.get(value.index()).cloned().flatten() {
                    slot_classes.insert(*slot, class);
                }
            }
            LirInstr::LoadSlot { slot, result } => {
                if let Some(class) = slot_classes.get(slot) {
                    set(&mut classes, *result, class.clone());
                }
            }
            _ => {}
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::ClassInfo;
    use crate::lir::ValueStorage;

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register(ClassInfo::new("Shape").with_method("area", 0, false));
        registry.register(ClassInfo::new("Square").extends("Shape"));
        registry
    }

    fn call_on(class: &str) -> MethodBody {
        let mut body = MethodBody::new("f");
        body.temps = vec![
            Some(ValueStorage::reference(ValueType::UserClass(class.into()))),
            Some(ValueStorage::reference(ValueType::Array)),
            Some(ValueStorage::object()),
        ];
        body.instructions = vec![
            LirInstr::BuildArray {
                elements: Vec::new(),
                result: TempId(1),
            },
            LirInstr::CallMember {
                receiver: TempId(0),
                name: "area".into(),
                args_array: TempId(1),
                result: TempId(2),
            },
        ];
        body
    }

    /// `const s = new Square(); s.area()` before type normalization
    fn call_through_slot(load_first: bool) -> MethodBody {
        let mut body = MethodBody::new("f");
        body.temps = vec![
            Some(ValueStorage::object()),
            Some(ValueStorage::object()),
            Some(ValueStorage::reference(ValueType::Array)),
            Some(ValueStorage::object()),
        ];
        let store = LirInstr::StoreSlot {
            slot: SlotId(0),
            value: TempId(0),
        };
        let load = LirInstr::LoadSlot {
            slot: SlotId(0),
            result: TempId(1),
        };
        let (first, second) = if load_first { (load, store) } else { (store, load) };
        body.instructions = vec![
            LirInstr::NewUserClass {
                class: "Square".into(),
                args: Vec::new(),
                result: TempId(0),
            },
            first,
            second,
            LirInstr::BuildArray {
                elements: Vec::new(),
                result: TempId(2),
            },
            LirInstr::CallMember {
                receiver: TempId(1),
                name: "area".into(),
                args_array: TempId(2),
                result: TempId(3),
            },
        ];
        body.single_assignment_slots.insert(SlotId(0));
        body
    }

    #[test]
    fn test_class_flows_through_single_assignment_slot() {
        let registry = registry();
        let mut body = call_through_slot(false);
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 1);
        assert!(matches!(
            body.instructions.last(),
            Some(LirInstr::CallTypedMemberWithFallback { receiver: TempId(1), .. })
        ));
    }

    #[test]
    fn test_load_before_store_stays_dynamic() {
        let registry = registry();
        let mut body = call_through_slot(true);
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 0);
    }

    #[test]
    fn test_reassigned_slot_stays_dynamic() {
        let registry = registry();
        let mut body = call_through_slot(false);
        body.single_assignment_slots.clear();
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 0);
    }

    #[test]
    fn test_class_flows_through_copy() {
        let registry = registry();
        let mut body = call_on("Shape");
        body.temps.push(Some(ValueStorage::object()));
        body.instructions.insert(
            1,
            LirInstr::CopyTemp {
                source: TempId(0),
                result: TempId(3),
            },
        );
        if let LirInstr::CallMember { receiver, .. } = &mut body.instructions[2] {
            *receiver = TempId(3);
        }
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 1);
        assert!(matches!(
            body.instructions.last(),
            Some(LirInstr::CallTypedMember { receiver: TempId(3), .. })
        ));
    }

    #[test]
    fn test_exact_receiver_gets_direct_call() {
        let registry = registry();
        let mut body = call_on("Shape");
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 1);
        assert_eq!(body.instructions.len(), 1);
        assert!(matches!(
            &body.instructions[0],
            LirInstr::CallTypedMember { class, .. } if class == "Shape"
        ));
    }

    #[test]
    fn test_subclass_receiver_gets_guarded_call() {
        let registry = registry();
        let mut body = call_on("Square");
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 1);
        assert!(matches!(
            body.instructions[0],
            LirInstr::CallTypedMemberWithFallback { .. }
        ));
    }

    #[test]
    fn test_ambiguous_method_stays_dynamic() {
        let mut registry = registry();
        registry.register(ClassInfo::new("Circle").with_method("area", 0, false));
        let mut body = call_on("Shape");
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 0);
        assert_eq!(body.instructions.len(), 2);
    }

    #[test]
    fn test_shared_argument_array_stays_dynamic() {
        let registry = registry();
        let mut body = call_on("Shape");
        body.instructions.push(LirInstr::Return { value: TempId(1) });
        assert_eq!(MemberCallNormalizer::new(&registry).run(&mut body), 0);
    }
}
