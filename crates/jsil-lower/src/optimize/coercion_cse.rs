//! Coercion Common Subexpression Elimination
//!
//! Within a basic block, a repeated coercion of the same unboxed primitive temp is
//! replaced by a copy of the first result. Coercions of object-shaped values are
//! left alone: boxing them again may observe a different object.

use crate::lir::{LirInstr, MethodBody, TempId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CoercionKind {
    ToObject,
    ToNumber,
    ToBoolean,
    Truthy,
    ToString,
}

fn coercion(instr: &LirInstr) -> Option<(CoercionKind, TempId, TempId)> {
    let (kind, source, result) = match instr {
        LirInstr::ConvertToObject { source, result } => (CoercionKind::ToObject, source, result),
        LirInstr::ConvertToNumber { source, result } => (CoercionKind::ToNumber, source, result),
        LirInstr::ConvertToBoolean { source, result } => {
            (CoercionKind::ToBoolean, source, result)
        }
        LirInstr::IsTruthy { source, result } => (CoercionKind::Truthy, source, result),
        LirInstr::ConvertToString { source, result } => (CoercionKind::ToString, source, result),
        _ => return None,
    };
    Some((kind, *source, *result))
}

/// The instruction ends a basic block
fn ends_block(instr: &LirInstr) -> bool {
    instr.branch_target().is_some()
        || matches!(
            instr,
            LirInstr::Label { .. }
                | LirInstr::Return { .. }
                | LirInstr::Throw { .. }
                | LirInstr::EndFinally
                | LirInstr::Suspend { .. }
                | LirInstr::AsyncReject { .. }
                | LirInstr::ResumeDispatch { .. }
        )
}

/// Coercion CSE pass
pub struct CoercionCse;

impl CoercionCse {
    /// Create a new coercion CSE pass
    pub fn new() -> Self {
        Self
    }

    /// Run over one body; returns the number of coercions replaced
    pub fn run(&self, body: &mut MethodBody) -> usize {
        let mut available: FxHashMap<(CoercionKind, TempId), TempId> = FxHashMap::default();
        let mut rewritten = 0;

        for index in 0..body.instructions.len() {
            let instr = &body.instructions[index];
            if ends_block(instr) {
                available.clear();
                continue;
            }
            let Some((kind, source, result)) = coercion(instr) else {
                continue;
            };
            if !body.storage_of(source).is_unboxed() {
                continue;
            }
            match available.get(&(kind, source)) {
                Some(&previous) if body.storage_of(previous) == body.storage_of(result) => {
                    body.instructions[index] = LirInstr::CopyTemp {
                        source: previous,
                        result,
                    };
                    rewritten += 1;
                }
                Some(_) => {}
                None => {
                    available.insert((kind, source), result);
                }
            }
        }
        rewritten
    }
}

impl Default for CoercionCse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::{LabelId, ValueStorage, ValueType};

    fn body_with(temps: Vec<ValueStorage>, instructions: Vec<LirInstr>) -> MethodBody {
        let mut body = MethodBody::new("f");
        body.temps = temps.into_iter().map(Some).collect();
        body.instructions = instructions;
        body
    }

    fn boxed_double() -> ValueStorage {
        ValueStorage::boxed(ValueType::Double)
    }

    #[test]
    fn test_repeated_boxing_becomes_copy() {
        let mut body = body_with(
            vec![ValueStorage::double(), boxed_double(), boxed_double()],
            vec![
                LirInstr::ConvertToObject {
                    source: TempId(0),
                    result: TempId(1),
                },
                LirInstr::ConvertToObject {
                    source: TempId(0),
                    result: TempId(2),
                },
            ],
        );
        assert_eq!(CoercionCse::new().run(&mut body), 1);
        assert_eq!(
            body.instructions[1],
            LirInstr::CopyTemp {
                source: TempId(1),
                result: TempId(2),
            }
        );
    }

    #[test]
    fn test_object_sources_are_untouched() {
        let mut body = body_with(
            vec![
                ValueStorage::object(),
                ValueStorage::double(),
                ValueStorage::double(),
            ],
            vec![
                LirInstr::ConvertToNumber {
                    source: TempId(0),
                    result: TempId(1),
                },
                LirInstr::ConvertToNumber {
                    source: TempId(0),
                    result: TempId(2),
                },
            ],
        );
        assert_eq!(CoercionCse::new().run(&mut body), 0);
    }

    #[test]
    fn test_label_ends_block() {
        let mut body = body_with(
            vec![ValueStorage::double(), boxed_double(), boxed_double()],
            vec![
                LirInstr::ConvertToObject {
                    source: TempId(0),
                    result: TempId(1),
                },
                LirInstr::Label { label: LabelId(0) },
                LirInstr::ConvertToObject {
                    source: TempId(0),
                    result: TempId(2),
                },
            ],
        );
        assert_eq!(CoercionCse::new().run(&mut body), 0);
    }
}
