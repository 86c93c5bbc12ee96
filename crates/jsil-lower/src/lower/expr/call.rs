//! Calls and `new`
//!
//! Calls are bound as early as the available information allows: direct calls to
//! known function declarations, intrinsic calls, static and typed instance methods of
//! user classes. Everything else is a dynamic call through a function value or a
//! member lookup.

use crate::error::{unsupported, LowerResult};
use crate::hir::{Argument, BindingId, BindingKind, Expr, NewCallee};
use crate::lir::{LirInstr, TempId, ValueStorage, ValueType};
use crate::lower::Lowerer;

/// Evaluated call arguments
pub(crate) enum LoweredArgs {
    /// Plain arguments, each object-shaped
    Fixed(Vec<TempId>),
    /// Arguments with spreads, collected into a runtime array
    Array(TempId),
}

impl<'a> Lowerer<'a> {
    /// Lower call arguments left to right. `after_operand` is set when a temp
    /// evaluated earlier (callee, receiver) must stay alive across them.
    pub(crate) fn lower_arguments(
        &mut self,
        args: &[Argument],
        after_operand: bool,
    ) -> LowerResult<LoweredArgs> {
        let skip = usize::from(!after_operand);
        self.check_no_suspend(args.iter().skip(skip).map(Argument::expr))?;

        if !args.iter().any(Argument::is_spread) {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let value = self.lower_expr(arg.expr())?;
                values.push(self.ensure_object(value));
            }
            return Ok(LoweredArgs::Fixed(values));
        }

        let array = self.new_temp(ValueStorage::reference(ValueType::Array));
        self.emit(LirInstr::NewJsArray {
            elements: Vec::new(),
            result: array,
        });
        for arg in args {
            let value = self.lower_expr(arg.expr())?;
            let value = self.ensure_object(value);
            match arg {
                Argument::Plain(_) => self.emit(LirInstr::ArrayAdd { array, value }),
                Argument::Spread(_) => self.emit(LirInstr::ArrayAddRange {
                    array,
                    iterable: value,
                }),
            }
        }
        Ok(LoweredArgs::Array(array))
    }

    /// Plain argument list, or `None` when a spread is present
    fn lower_plain_arguments(&mut self, args: &[Argument]) -> LowerResult<Option<Vec<TempId>>> {
        if args.iter().any(Argument::is_spread) {
            return Ok(None);
        }
        match self.lower_arguments(args, false)? {
            LoweredArgs::Fixed(values) => Ok(Some(values)),
            LoweredArgs::Array(_) => Ok(None),
        }
    }

    fn args_array(&mut self, args: LoweredArgs) -> TempId {
        match args {
            LoweredArgs::Array(array) => array,
            LoweredArgs::Fixed(elements) => {
                let result = self.new_temp(ValueStorage::reference(ValueType::Array));
                self.emit(LirInstr::BuildArray { elements, result });
                result
            }
        }
    }

    pub(crate) fn lower_call(
        &mut self,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
    ) -> LowerResult<TempId> {
        if optional {
            return self.lower_optional_call(callee, args);
        }
        match callee {
            Expr::Variable(binding) => {
                if let Some(result) = self.try_direct_call(*binding, args)? {
                    return Ok(result);
                }
            }
            Expr::Intrinsic(name) if !args.iter().any(Argument::is_spread) => {
                let Some(args) = self.lower_plain_arguments(args)? else {
                    return unsupported("spread in intrinsic call");
                };
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::CallIntrinsicGlobal {
                    name: name.clone(),
                    args,
                    result,
                });
                return Ok(result);
            }
            Expr::Member {
                object,
                property,
                optional: false,
            } => return self.lower_member_call(object, property, args),
            _ => {}
        }

        let function = self.lower_expr(callee)?;
        let args = self.lower_arguments(args, true)?;
        Ok(self.emit_value_call(function, args))
    }

    /// Call of a function declaration whose compiled callable is known
    fn try_direct_call(
        &mut self,
        binding: BindingId,
        args: &[Argument],
    ) -> LowerResult<Option<TempId>> {
        let info = self.scopes.binding(binding);
        let (BindingKind::Function, Some(callable), Some(scope)) =
            (info.kind, info.callable.clone(), info.function_scope)
        else {
            return Ok(None);
        };
        let Some(args) = self.lower_plain_arguments(args)? else {
            return Ok(None);
        };
        let scopes = self.build_callee_scopes(scope)?;
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallFunction {
            callable,
            scopes,
            args,
            result,
        });
        Ok(Some(result))
    }

    fn emit_value_call(&mut self, function: TempId, args: LoweredArgs) -> TempId {
        let function = self.ensure_object(function);
        let scopes = self.current_scopes_array();
        let result = self.new_temp(ValueStorage::object());
        match args {
            LoweredArgs::Fixed(args) if args.len() <= self.options.max_fixed_call_arity => {
                self.emit(LirInstr::CallFunctionValue {
                    function,
                    scopes,
                    args,
                    result,
                });
            }
            args => {
                let args_array = self.args_array(args);
                self.emit(LirInstr::CallFunctionValueWithArray {
                    function,
                    scopes,
                    args_array,
                    result,
                });
            }
        }
        result
    }

    fn lower_member_call(
        &mut self,
        object: &Expr,
        name: &str,
        args: &[Argument],
    ) -> LowerResult<TempId> {
        let registry = self.registry;
        let plain = !args.iter().any(Argument::is_spread);
        match object {
            Expr::Intrinsic(intrinsic) if plain => {
                if let Some(args) = self.lower_plain_arguments(args)? {
                    let result = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::CallIntrinsicMember {
                        intrinsic: intrinsic.clone(),
                        method: name.to_string(),
                        args,
                        result,
                    });
                    return Ok(result);
                }
            }
            Expr::ClassRef(class) if plain => {
                if let Some(method) = registry.static_method(class, name, args.len()) {
                    if let Some(args) = self.lower_plain_arguments(args)? {
                        let result = self.new_temp(ValueStorage::object());
                        self.emit(LirInstr::CallUserClassStaticMethod {
                            class: class.clone(),
                            name: name.to_string(),
                            callable: method.callable.clone(),
                            args,
                            result,
                        });
                        return Ok(result);
                    }
                }
            }
            _ => {}
        }

        let receiver = self.lower_expr(object)?;
        let args = self.lower_arguments(args, true)?;
        if let LoweredArgs::Fixed(values) = &args {
            if let Some(result) = self.try_typed_member_call(receiver, name, values) {
                return Ok(result);
            }
        }
        Ok(self.emit_member_call(receiver, name, args))
    }

    /// Early-bound call on a receiver whose class has no subclasses
    fn try_typed_member_call(
        &mut self,
        receiver: TempId,
        name: &str,
        args: &[TempId],
    ) -> Option<TempId> {
        let registry = self.registry;
        let class = self.receiver_class(receiver)?;
        if registry.has_subclasses(&class) {
            return None;
        }
        let (declaring, method) = registry.instance_method(&class, name, args.len())?;
        let storage = if method.returns_this {
            ValueStorage::reference(ValueType::UserClass(class))
        } else {
            ValueStorage::object()
        };
        let result = self.new_temp(storage);
        self.emit(LirInstr::CallTypedMember {
            class: declaring.name.clone(),
            name: name.to_string(),
            callable: method.callable.clone(),
            receiver,
            args: args.to_vec(),
            result,
        });
        Some(result)
    }

    /// Call a method value read once from `receiver`, keeping `receiver` as `this`
    fn emit_method_value_call(
        &mut self,
        function: TempId,
        receiver: TempId,
        args: LoweredArgs,
    ) -> TempId {
        let scopes = self.current_scopes_array();
        let args_array = self.args_array(args);
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::CallMethodValue {
            function,
            receiver,
            scopes,
            args_array,
            result,
        });
        result
    }

    fn emit_member_call(&mut self, receiver: TempId, name: &str, args: LoweredArgs) -> TempId {
        let receiver = self.ensure_object(receiver);
        let result = self.new_temp(ValueStorage::object());
        match args {
            LoweredArgs::Fixed(args) if args.len() <= self.options.max_fixed_call_arity => {
                self.emit(LirInstr::CallMemberFixed {
                    receiver,
                    name: name.to_string(),
                    args,
                    result,
                });
            }
            args => {
                let args_array = self.args_array(args);
                self.emit(LirInstr::CallMember {
                    receiver,
                    name: name.to_string(),
                    args_array,
                    result,
                });
            }
        }
        result
    }

    /// `f?.(...)` and `o.m?.(...)`: undefined when the callee is null or undefined
    fn lower_optional_call(&mut self, callee: &Expr, args: &[Argument]) -> LowerResult<TempId> {
        if let Expr::Member {
            object,
            property,
            optional: false,
        } = callee
        {
            let receiver = self.lower_expr(object)?;
            let receiver = self.ensure_object(receiver);
            let method = self.new_temp(ValueStorage::object());
            self.emit(LirInstr::GetProperty {
                object: receiver,
                name: property.clone(),
                result: method,
            });
            return self.lower_optional_access(method, |this, method| {
                let args = this.lower_arguments(args, true)?;
                Ok(this.emit_method_value_call(method, receiver, args))
            });
        }

        let function = self.lower_expr(callee)?;
        self.lower_optional_access(function, |this, function| {
            let args = this.lower_arguments(args, true)?;
            Ok(this.emit_value_call(function, args))
        })
    }

    pub(crate) fn lower_super_call(&mut self, args: &[Argument]) -> LowerResult<TempId> {
        let Some(parent) = self
            .function
            .class
            .as_ref()
            .and_then(|class| class.parent.clone())
        else {
            return unsupported("super call outside a derived constructor");
        };
        let Some(args) = self.lower_plain_arguments(args)? else {
            return unsupported("spread in super call");
        };
        self.emit(LirInstr::CallSuperConstructor {
            class: parent,
            args,
        });
        self.super_called = true;
        self.lower_expr(&Expr::This)
    }

    pub(crate) fn lower_new(&mut self, callee: &NewCallee, args: &[Argument]) -> LowerResult<TempId> {
        match callee {
            NewCallee::UserClass(class) => {
                let Some(arity) = self.registry.class(class).map(|info| info.constructor_arity)
                else {
                    return unsupported(format_args!("unknown class `{}`", class));
                };
                if args.len() > arity {
                    return unsupported(format_args!(
                        "`{}` constructor takes {} arguments, got {}",
                        class,
                        arity,
                        args.len()
                    ));
                }
                let Some(mut args) = self.lower_plain_arguments(args)? else {
                    return unsupported("spread in user class construction");
                };
                while args.len() < arity {
                    let undefined = self.const_undefined();
                    args.push(undefined);
                }
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::NewUserClass {
                    class: class.clone(),
                    args,
                    result,
                });
                Ok(result)
            }
            NewCallee::Intrinsic(intrinsic) => {
                let Some(args) = self.lower_plain_arguments(args)? else {
                    return unsupported("spread in intrinsic construction");
                };
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::NewIntrinsic {
                    intrinsic: intrinsic.clone(),
                    args,
                    result,
                });
                Ok(result)
            }
            NewCallee::Value(constructor) => {
                let constructor = self.lower_expr(constructor)?;
                let constructor = self.ensure_object(constructor);
                let args = self.lower_arguments(args, true)?;
                let args_array = self.args_array(args);
                let result = self.new_temp(ValueStorage::object());
                self.emit(LirInstr::NewFromValue {
                    constructor,
                    args_array,
                    result,
                });
                Ok(result)
            }
        }
    }
}
