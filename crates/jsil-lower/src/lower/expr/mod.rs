//! Expression Lowering
//!
//! Converts HIR expressions to LIR instructions. Every lowered expression yields one
//! temp whose storage descriptor says how the value is represented.

mod assign;
mod binary;
mod call;
mod destructure;
mod member;

use super::Lowerer;
use crate::error::LowerResult;
use crate::hir::{ArrayElement, Expr, FunctionKind, ObjectMember, PropertyKey, UnaryOp};
use crate::lir::{
    BuiltInError, LirInstr, NumericUnaryOp, RuntimeHelper, TempId, ValueStorage, ValueType,
};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> LowerResult<TempId> {
        match expr {
            Expr::Number(value) => Ok(self.const_number(*value)),
            Expr::String(value) => Ok(self.const_string(value)),
            Expr::Bool(value) => Ok(self.const_bool(*value)),
            Expr::Null => Ok(self.const_null()),
            Expr::Undefined => Ok(self.const_undefined()),
            Expr::Variable(binding) => self.load_binding(*binding),
            Expr::Intrinsic(name) => {
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::GetIntrinsicGlobal {
                    name: name.clone(),
                    result,
                });
                Ok(result)
            }
            Expr::ClassRef(class) => {
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::GetUserClassType {
                    class: class.clone(),
                    result,
                });
                Ok(result)
            }
            Expr::This => self.lower_this(),
            Expr::Array(elements) => self.lower_array_literal(elements),
            Expr::Object(members) => self.lower_object_literal(members),
            Expr::Template { quasis, exprs } => self.lower_template(quasis, exprs),
            Expr::Unary { op, operand } => self.lower_unary(*op, operand),
            Expr::Binary { op, left, right } => self.lower_binary(*op, left, right),
            Expr::Logical { op, left, right } => self.lower_logical(*op, left, right),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => self.lower_conditional(test, consequent, alternate),
            Expr::Assign { target, value } => self.lower_assign(target, value),
            Expr::CompoundAssign { op, target, value } => {
                self.lower_compound_assign(*op, target, value)
            }
            Expr::Update { op, prefix, target } => self.lower_update(*op, *prefix, target),
            Expr::Member {
                object,
                property,
                optional,
            } => self.lower_member(object, property, *optional),
            Expr::Index {
                object,
                index,
                optional,
            } => self.lower_index(object, index, *optional),
            Expr::Call {
                callee,
                args,
                optional,
            } => self.lower_call(callee, args, *optional),
            Expr::SuperCall(args) => self.lower_super_call(args),
            Expr::New { callee, args } => self.lower_new(callee, args),
            Expr::Function(function) => self.lower_closure(function),
            Expr::Sequence(exprs) => {
                let mut last = None;
                for expr in exprs {
                    last = Some(self.lower_expr(expr)?);
                }
                match last {
                    Some(value) => Ok(value),
                    None => Ok(self.const_undefined()),
                }
            }
            Expr::Await(argument) => self.lower_await(argument),
            Expr::Yield { argument, delegate } => {
                self.lower_yield(argument.as_deref(), *delegate)
            }
        }
    }

    /// Lower a condition to an unboxed bool
    pub(crate) fn lower_condition(&mut self, test: &Expr) -> LowerResult<TempId> {
        let value = self.lower_expr(test)?;
        Ok(self.ensure_boolean(value))
    }

    fn lower_this(&mut self) -> LowerResult<TempId> {
        if self.function.is_derived_constructor() && !self.super_called {
            self.emit_builtin_throw(
                BuiltInError::ReferenceError,
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor".to_string(),
            )?;
            return Ok(self.const_undefined());
        }
        let storage = match (&self.function.class, self.function.kind) {
            (Some(class), FunctionKind::Constructor | FunctionKind::Method) => {
                ValueStorage::reference(ValueType::UserClass(class.name.clone()))
            }
            _ => ValueStorage::object(),
        };
        let result = self.new_temp(storage);
        self.emit(LirInstr::LoadThis { result });
        Ok(result)
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr) -> LowerResult<TempId> {
        let value = self.lower_expr(operand)?;
        let result = match op {
            UnaryOp::Neg | UnaryOp::BitNot => {
                let operand = self.ensure_number(value);
                let result = self.new_temp(ValueStorage::double());
                let op = if op == UnaryOp::Neg {
                    NumericUnaryOp::Neg
                } else {
                    NumericUnaryOp::BitNot
                };
                self.emit(LirInstr::UnaryNumber {
                    op,
                    operand,
                    result,
                });
                result
            }
            UnaryOp::Plus => self.ensure_number(value),
            UnaryOp::Not => {
                let operand = self.ensure_boolean(value);
                let result = self.new_temp(ValueStorage::bool());
                self.emit(LirInstr::NotBool { operand, result });
                result
            }
            UnaryOp::TypeOf => {
                let value = self.ensure_object(value);
                let result = self.new_temp(ValueStorage::string());
                self.emit(LirInstr::TypeOf { value, result });
                result
            }
            UnaryOp::Void => self.const_undefined(),
        };
        Ok(result)
    }

    fn lower_conditional(
        &mut self,
        test: &Expr,
        consequent: &Expr,
        alternate: &Expr,
    ) -> LowerResult<TempId> {
        let carrier = self.join_carrier("conditional", ValueStorage::object());
        let else_label = self.new_label();
        let end = self.new_label();

        let condition = self.lower_condition(test)?;
        self.emit(LirInstr::BranchIfFalse {
            condition,
            target: else_label,
        });
        let value = self.lower_expr(consequent)?;
        self.store_carrier(&carrier, value);
        self.emit(LirInstr::Branch { target: end });

        self.place_label(else_label);
        let value = self.lower_expr(alternate)?;
        self.store_carrier(&carrier, value);
        self.place_label(end);
        Ok(self.load_carrier(&carrier))
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn lower_template(&mut self, quasis: &[String], exprs: &[Expr]) -> LowerResult<TempId> {
        let leading_text = quasis.first().is_some_and(|quasi| !quasi.is_empty());
        self.check_no_suspend(exprs.iter().skip(usize::from(!leading_text)))?;
        let mut acc: Option<TempId> = None;
        for (index, quasi) in quasis.iter().enumerate() {
            if !quasi.is_empty() {
                let part = self.const_string(quasi);
                acc = Some(self.concat(acc, part));
            }
            if let Some(expr) = exprs.get(index) {
                let value = self.lower_expr(expr)?;
                let part = self.ensure_string(value);
                acc = Some(self.concat(acc, part));
            }
        }
        match acc {
            Some(result) => Ok(result),
            None => Ok(self.const_string("")),
        }
    }

    fn concat(&mut self, acc: Option<TempId>, part: TempId) -> TempId {
        let Some(left) = acc else {
            return part;
        };
        let result = self.new_temp(ValueStorage::string());
        self.emit(LirInstr::ConcatStrings {
            left,
            right: part,
            result,
        });
        result
    }

    fn lower_array_literal(&mut self, elements: &[ArrayElement]) -> LowerResult<TempId> {
        let operands = elements.iter().filter_map(|element| match element {
            ArrayElement::Item(expr) | ArrayElement::Spread(expr) => Some(expr),
            ArrayElement::Hole => None,
        });
        self.check_no_suspend(operands.skip(1))?;

        let spread_at = elements
            .iter()
            .position(|element| matches!(element, ArrayElement::Spread(_)))
            .unwrap_or(elements.len());

        let mut leading = Vec::with_capacity(spread_at);
        for element in &elements[..spread_at] {
            let value = match element {
                ArrayElement::Item(expr) => self.lower_expr(expr)?,
                _ => self.const_undefined(),
            };
            leading.push(self.ensure_object(value));
        }
        let array = self.new_temp(ValueStorage::reference(ValueType::Array));
        self.emit(LirInstr::NewJsArray {
            elements: leading,
            result: array,
        });

        for element in &elements[spread_at..] {
            match element {
                ArrayElement::Item(expr) => {
                    let value = self.lower_expr(expr)?;
                    let value = self.ensure_object(value);
                    self.emit(LirInstr::ArrayAdd { array, value });
                }
                ArrayElement::Spread(expr) => {
                    let value = self.lower_expr(expr)?;
                    let iterable = self.ensure_object(value);
                    self.emit(LirInstr::ArrayAddRange { array, iterable });
                }
                ArrayElement::Hole => {
                    let value = self.const_undefined();
                    self.emit(LirInstr::ArrayAdd { array, value });
                }
            }
        }
        Ok(array)
    }

    fn lower_object_literal(&mut self, members: &[ObjectMember]) -> LowerResult<TempId> {
        let operands = members.iter().flat_map(|member| match member {
            ObjectMember::Property {
                key: PropertyKey::Computed(key),
                value,
            } => vec![key, value],
            ObjectMember::Property { value, .. } => vec![value],
            ObjectMember::Spread(expr) => vec![expr],
        });
        self.check_no_suspend(operands.skip(1))?;

        let dynamic_at = members
            .iter()
            .position(|member| {
                !matches!(
                    member,
                    ObjectMember::Property {
                        key: PropertyKey::Named(_),
                        ..
                    }
                )
            })
            .unwrap_or(members.len());

        let mut properties = Vec::with_capacity(dynamic_at);
        for member in &members[..dynamic_at] {
            if let ObjectMember::Property {
                key: PropertyKey::Named(name),
                value,
            } = member
            {
                let value = self.lower_expr(value)?;
                properties.push((name.clone(), self.ensure_object(value)));
            }
        }
        let object = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::NewJsObject {
            properties,
            result: object,
        });

        for member in &members[dynamic_at..] {
            match member {
                ObjectMember::Property {
                    key: PropertyKey::Named(name),
                    value,
                } => {
                    let value = self.lower_expr(value)?;
                    let value = self.ensure_object(value);
                    self.emit(LirInstr::SetProperty {
                        object,
                        name: name.clone(),
                        value,
                    });
                }
                ObjectMember::Property {
                    key: PropertyKey::Computed(key),
                    value,
                } => {
                    let key = self.lower_expr(key)?;
                    let key = self.ensure_object(key);
                    let value = self.lower_expr(value)?;
                    let value = self.ensure_object(value);
                    self.emit(LirInstr::SetItem { object, key, value });
                }
                ObjectMember::Spread(expr) => {
                    let source = self.lower_expr(expr)?;
                    let source = self.ensure_object(source);
                    let result = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::CallRuntime {
                        helper: RuntimeHelper::ObjectAssign,
                        args: vec![object, source],
                        result,
                    });
                }
            }
        }
        Ok(object)
    }
}
