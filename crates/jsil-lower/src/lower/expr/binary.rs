//! Binary and logical operators
//!
//! Operators stay on native numeric instructions while both operands are unboxed and
//! fall back to runtime dispatch otherwise.

use crate::error::LowerResult;
use crate::hir::{BinaryOp, Expr, LogicalOp};
use crate::lir::{CompareOp, DynamicOp, LirInstr, NumericOp, TempId, ValueStorage};
use crate::lower::Lowerer;

/// Lowering strategy of a binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorClass {
    /// `+`: numeric, string concatenation or dynamic add
    Add,
    /// Always numeric after coercing both operands
    Numeric(NumericOp),
    /// Boolean result; numeric compare for unboxed doubles, runtime dispatch otherwise
    Relational(DynamicOp),
}

fn classify(op: BinaryOp) -> OperatorClass {
    use OperatorClass::{Numeric, Relational};
    match op {
        BinaryOp::Add => OperatorClass::Add,
        BinaryOp::Sub => Numeric(NumericOp::Sub),
        BinaryOp::Mul => Numeric(NumericOp::Mul),
        BinaryOp::Div => Numeric(NumericOp::Div),
        BinaryOp::Mod => Numeric(NumericOp::Mod),
        BinaryOp::Exp => Numeric(NumericOp::Exp),
        BinaryOp::BitAnd => Numeric(NumericOp::BitAnd),
        BinaryOp::BitOr => Numeric(NumericOp::BitOr),
        BinaryOp::BitXor => Numeric(NumericOp::BitXor),
        BinaryOp::Shl => Numeric(NumericOp::Shl),
        BinaryOp::Shr => Numeric(NumericOp::Shr),
        BinaryOp::UShr => Numeric(NumericOp::UShr),
        BinaryOp::LooseEq => Relational(DynamicOp::LooseEq),
        BinaryOp::LooseNe => Relational(DynamicOp::LooseNe),
        BinaryOp::StrictEq => Relational(DynamicOp::StrictEq),
        BinaryOp::StrictNe => Relational(DynamicOp::StrictNe),
        BinaryOp::Lt => Relational(DynamicOp::Lt),
        BinaryOp::Le => Relational(DynamicOp::Le),
        BinaryOp::Gt => Relational(DynamicOp::Gt),
        BinaryOp::Ge => Relational(DynamicOp::Ge),
        BinaryOp::InstanceOf => Relational(DynamicOp::InstanceOf),
        BinaryOp::In => Relational(DynamicOp::In),
    }
}

/// Numeric comparison used when both operands are unboxed doubles
fn compare_op(op: BinaryOp) -> Option<CompareOp> {
    let op = match op {
        BinaryOp::Lt => CompareOp::Lt,
        BinaryOp::Le => CompareOp::Le,
        BinaryOp::Gt => CompareOp::Gt,
        BinaryOp::Ge => CompareOp::Ge,
        BinaryOp::StrictEq | BinaryOp::LooseEq => CompareOp::Eq,
        BinaryOp::StrictNe | BinaryOp::LooseNe => CompareOp::Ne,
        _ => return None,
    };
    Some(op)
}

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> LowerResult<TempId> {
        self.check_no_suspend([right])?;
        if let OperatorClass::Numeric(numeric) = classify(op) {
            // coerce each operand as soon as it exists so a dynamic `+` operand fuses
            let left = self.lower_expr(left)?;
            let left = self.ensure_number(left);
            let right = self.lower_expr(right)?;
            let right = self.ensure_number(right);
            return Ok(self.emit_numeric(numeric, left, right));
        }
        let left = self.lower_expr(left)?;
        let right = self.lower_expr(right)?;
        Ok(self.apply_binary(op, left, right))
    }

    /// Combine two already-lowered operands
    pub(crate) fn apply_binary(&mut self, op: BinaryOp, left: TempId, right: TempId) -> TempId {
        let dynamic = match classify(op) {
            OperatorClass::Add => return self.apply_add(left, right),
            OperatorClass::Numeric(numeric) => {
                let left = self.ensure_number(left);
                let right = self.ensure_number(right);
                return self.emit_numeric(numeric, left, right);
            }
            OperatorClass::Relational(dynamic) => dynamic,
        };

        let both_doubles = self.storage_of(left).is_unboxed_double()
            && self.storage_of(right).is_unboxed_double();
        if both_doubles {
            if let Some(compare) = compare_op(op) {
                let result = self.new_temp(ValueStorage::bool());
                self.emit(LirInstr::CompareNumber {
                    op: compare,
                    left,
                    right,
                    result,
                });
                return result;
            }
        }

        let left = self.ensure_object(left);
        let right = self.ensure_object(right);
        let result = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::BinaryDynamic {
            op: dynamic,
            left,
            right,
            result,
        });
        result
    }

    fn apply_add(&mut self, left: TempId, right: TempId) -> TempId {
        let left_storage = self.storage_of(left);
        let right_storage = self.storage_of(right);

        let string_concat = (left_storage.is_string() || right_storage.is_string())
            && (left_storage.is_string() || left_storage.is_unboxed())
            && (right_storage.is_string() || right_storage.is_unboxed());
        if string_concat {
            let left = self.ensure_string(left);
            let right = self.ensure_string(right);
            let result = self.new_temp(ValueStorage::string());
            self.emit(LirInstr::ConcatStrings {
                left,
                right,
                result,
            });
            return result;
        }

        if left_storage.is_unboxed() && right_storage.is_unboxed() {
            let left = self.ensure_number(left);
            let right = self.ensure_number(right);
            return self.emit_numeric(NumericOp::Add, left, right);
        }

        let left = self.ensure_object(left);
        let right = self.ensure_object(right);
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::AddDynamic {
            left,
            right,
            result,
        });
        result
    }

    fn emit_numeric(&mut self, op: NumericOp, left: TempId, right: TempId) -> TempId {
        let result = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::BinaryNumber {
            op,
            left,
            right,
            result,
        });
        result
    }

    /// `&&`, `||` and `??`: the right operand only runs when the left one does not
    /// decide the result
    pub(crate) fn lower_logical(
        &mut self,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
    ) -> LowerResult<TempId> {
        let carrier = self.join_carrier("logical", ValueStorage::object());
        let skip = self.new_label();
        let join = self.new_label();

        let left = self.lower_expr(left)?;
        let (condition, skip_when) = match op {
            LogicalOp::And => (self.ensure_boolean(left), false),
            LogicalOp::Or => (self.ensure_boolean(left), true),
            LogicalOp::Nullish => {
                let value = self.ensure_object(left);
                let nullish = self.new_temp(ValueStorage::bool());
                self.emit(LirInstr::IsNullOrUndefined {
                    value,
                    result: nullish,
                });
                (nullish, false)
            }
        };
        if skip_when {
            self.emit(LirInstr::BranchIfTrue {
                condition,
                target: skip,
            });
        } else {
            self.emit(LirInstr::BranchIfFalse {
                condition,
                target: skip,
            });
        }

        let right = self.lower_expr(right)?;
        self.store_carrier(&carrier, right);
        self.emit(LirInstr::Branch { target: join });

        self.place_label(skip);
        self.store_carrier(&carrier, left);
        self.place_label(join);
        Ok(self.load_carrier(&carrier))
    }
}
