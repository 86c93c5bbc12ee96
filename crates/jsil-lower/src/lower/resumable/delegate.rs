//! `yield*` delegation
//!
//! A generator operand is driven through its `next` / `throw` / `return` methods so
//! that requests sent to the outer generator are forwarded. Any other operand is
//! normalized to an array and walked by index. The walk position lives in state
//! fields so it survives each suspension.

use super::{HAS_RESUME_EXCEPTION, HAS_RETURN, RESUME_EXCEPTION, RESUME_VALUE, RETURN_VALUE};
use crate::error::LowerResult;
use crate::lir::{CompareOp, LirInstr, NumericOp, SuspendKind, TempId, ValueStorage, ValueType};
use crate::lower::{Carrier, Lowerer};

const MODE: &str = "_yieldStarMode";
const TARGET: &str = "_yieldStarTarget";
const INDEX: &str = "_yieldStarIndex";
const LENGTH: &str = "_yieldStarLength";

/// Delegation mode recorded for the driver
const MODE_NONE: f64 = 0.0;
const MODE_ARRAY: f64 = 1.0;
const MODE_GENERATOR: f64 = 2.0;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_yield_delegate(&mut self, operand: TempId) -> LowerResult<TempId> {
        let operand = self.ensure_object(operand);
        let result = self.join_carrier("yieldStar", ValueStorage::object());
        let generator_path = self.new_label();
        let done = self.new_label();

        let is_generator = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::IsInstanceOf {
            value: operand,
            class: "Generator".to_string(),
            result: is_generator,
        });
        self.emit(LirInstr::BranchIfTrue {
            condition: is_generator,
            target: generator_path,
        });

        self.lower_delegate_to_iterable(operand, &result)?;
        self.emit(LirInstr::Branch { target: done });

        self.place_label(generator_path);
        self.lower_delegate_to_generator(operand, &result)?;

        self.place_label(done);
        Ok(self.load_carrier(&result))
    }

    fn set_mode(&mut self, mode: f64) {
        let value = self.const_number(mode);
        self.store_state(MODE, value);
    }

    fn lower_delegate_to_iterable(&mut self, operand: TempId, result: &Carrier) -> LowerResult<()> {
        let head = self.new_label();
        let exhausted = self.new_label();

        let items = self.new_temp(ValueStorage::reference(ValueType::Array));
        self.emit(LirInstr::NormalizeIterable {
            source: operand,
            result: items,
        });
        self.set_mode(MODE_ARRAY);
        self.store_state(TARGET, items);
        let zero = self.const_number(0.0);
        self.store_state(INDEX, zero);
        let length = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::GetLength {
            object: items,
            result: length,
        });
        self.store_state(LENGTH, length);

        self.place_label(head);
        let index = self.load_state(INDEX, ValueStorage::double());
        let length = self.load_state(LENGTH, ValueStorage::double());
        let more = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::CompareNumber {
            op: CompareOp::Lt,
            left: index,
            right: length,
            result: more,
        });
        self.emit(LirInstr::BranchIfFalse {
            condition: more,
            target: exhausted,
        });
        let items = self.load_state(TARGET, ValueStorage::reference(ValueType::Array));
        let item = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetArrayElement {
            array: items,
            index,
            result: item,
        });
        let one = self.const_number(1.0);
        let next = self.new_temp(ValueStorage::double());
        self.emit(LirInstr::BinaryNumber {
            op: NumericOp::Add,
            left: index,
            right: one,
            result: next,
        });
        self.store_state(INDEX, next);
        self.emit_yield_value(item)?;
        self.emit(LirInstr::Branch { target: head });

        self.place_label(exhausted);
        self.set_mode(MODE_NONE);
        let null = self.const_null();
        self.store_state(TARGET, null);
        let undefined = self.const_undefined();
        self.store_carrier(result, undefined);
        Ok(())
    }

    fn lower_delegate_to_generator(&mut self, operand: TempId, result: &Carrier) -> LowerResult<()> {
        let step = self.new_label();
        let call_return = self.new_label();
        let call_throw = self.new_label();
        let after_call = self.new_label();
        let finished = self.new_label();
        let normal_completion = self.new_label();

        let step_result = self.join_carrier("yieldStarStep", ValueStorage::object());
        let was_return = self.join_carrier("yieldStarWasReturn", ValueStorage::bool());

        self.set_mode(MODE_GENERATOR);
        self.store_state(TARGET, operand);

        self.place_label(step);
        let has_return = self.load_state(HAS_RETURN, ValueStorage::bool());
        self.emit(LirInstr::BranchIfTrue {
            condition: has_return,
            target: call_return,
        });
        let has_exception = self.load_state(HAS_RESUME_EXCEPTION, ValueStorage::bool());
        self.emit(LirInstr::BranchIfTrue {
            condition: has_exception,
            target: call_throw,
        });
        self.forward_to_inner(&step_result, &was_return, "next", RESUME_VALUE, None, false);
        self.emit(LirInstr::Branch { target: after_call });

        self.place_label(call_return);
        self.forward_to_inner(
            &step_result,
            &was_return,
            "return",
            RETURN_VALUE,
            Some(HAS_RETURN),
            true,
        );
        self.emit(LirInstr::Branch { target: after_call });

        self.place_label(call_throw);
        self.forward_to_inner(
            &step_result,
            &was_return,
            "throw",
            RESUME_EXCEPTION,
            Some(HAS_RESUME_EXCEPTION),
            false,
        );

        self.place_label(after_call);
        let response = self.load_carrier(&step_result);
        let done = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetProperty {
            object: response,
            name: "done".to_string(),
            result: done,
        });
        let done = self.ensure_boolean(done);
        self.emit(LirInstr::BranchIfTrue {
            condition: done,
            target: finished,
        });
        let value = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetProperty {
            object: response,
            name: "value".to_string(),
            result: value,
        });
        self.emit_suspend(SuspendKind::Yield, value)?;
        self.emit(LirInstr::Branch { target: step });

        self.place_label(finished);
        let final_value = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetProperty {
            object: response,
            name: "value".to_string(),
            result: final_value,
        });
        self.set_mode(MODE_NONE);
        let null = self.const_null();
        self.store_state(TARGET, null);
        let returned = self.load_carrier(&was_return);
        self.emit(LirInstr::BranchIfFalse {
            condition: returned,
            target: normal_completion,
        });
        self.emit_return(final_value)?;
        self.place_label(normal_completion);
        self.store_carrier(result, final_value);
        Ok(())
    }

    /// Call `method` on the inner generator with the value the driver left in
    /// `argument_field`, clearing the request flag first
    fn forward_to_inner(
        &mut self,
        step_result: &Carrier,
        was_return: &Carrier,
        method: &str,
        argument_field: &str,
        request_flag: Option<&str>,
        returning: bool,
    ) {
        let flag = self.const_bool(returning);
        self.store_carrier(was_return, flag);
        if let Some(request_flag) = request_flag {
            let cleared = self.const_bool(false);
            self.store_state(request_flag, cleared);
        }
        let argument = self.load_state(argument_field, ValueStorage::object());
        let args_array = self.new_temp(ValueStorage::reference(ValueType::Array));
        self.emit(LirInstr::BuildArray {
            elements: vec![argument],
            result: args_array,
        });
        let inner = self.load_state(TARGET, ValueStorage::object());
        let response = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallMember {
            receiver: inner,
            name: method.to_string(),
            args_array,
            result: response,
        });
        self.store_carrier(step_result, response);
    }
}
