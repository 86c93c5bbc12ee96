//! Destructuring patterns
//!
//! Patterns bind a value that is already lowered. Object and array patterns check
//! the source for null/undefined before the first read, the way the runtime would
//! report it.

use crate::error::{unsupported, LowerResult};
use crate::hir::Pattern;
use crate::lir::{BuiltInError, LirInstr, RuntimeHelper, TempId, ValueStorage, ValueType};
use crate::lower::bindings::BindMode;
use crate::lower::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: TempId,
        mode: BindMode,
    ) -> LowerResult<()> {
        match pattern {
            Pattern::Binding(binding) => self.store_binding(*binding, value, mode),
            Pattern::Target(expr) => {
                let target = self.resolve_assign_target(expr)?;
                self.write_target(&target, value)
            }
            Pattern::Default { target, default } => {
                self.check_no_suspend([default.as_ref()])?;
                let value = self.apply_default(value, default)?;
                self.bind_pattern(target, value, mode)
            }
            Pattern::Object { properties, rest } => {
                self.check_nested_suspend(pattern)?;
                let source = self.ensure_object(value);
                self.emit_destructure_guard(source, pattern)?;
                for (key, target) in properties {
                    let property = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::GetProperty {
                        object: source,
                        name: key.clone(),
                        result: property,
                    });
                    self.bind_pattern(target, property, mode)?;
                }
                if let Some(rest) = rest {
                    let mut keys = Vec::with_capacity(properties.len());
                    for (key, _) in properties {
                        keys.push(self.const_string(key));
                    }
                    let excluded = self.new_temp(ValueStorage::reference(ValueType::Array));
                    self.emit(LirInstr::NewJsArray {
                        elements: keys,
                        result: excluded,
                    });
                    let remaining = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::CallRuntime {
                        helper: RuntimeHelper::ObjectRest,
                        args: vec![source, excluded],
                        result: remaining,
                    });
                    self.bind_pattern(rest, remaining, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                self.check_nested_suspend(pattern)?;
                let source = self.ensure_object(value);
                self.emit_destructure_guard(source, pattern)?;
                for (index, element) in elements.iter().enumerate() {
                    let Some(target) = element else {
                        continue;
                    };
                    let key = self.const_number(index as f64);
                    let key = self.ensure_object(key);
                    let item = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::GetItem {
                        object: source,
                        key,
                        result: item,
                    });
                    self.bind_pattern(target, item, mode)?;
                }
                if let Some(rest) = rest {
                    let start = self.const_number(elements.len() as f64);
                    let start = self.ensure_object(start);
                    let remaining = self.new_temp(ValueStorage::object());
                    self.emit(LirInstr::CallMemberFixed {
                        receiver: source,
                        name: "slice".to_string(),
                        args: vec![start],
                        result: remaining,
                    });
                    self.bind_pattern(rest, remaining, mode)?;
                }
                Ok(())
            }
        }
    }

    /// The source temp is read after every nested default
    fn check_nested_suspend(&self, pattern: &Pattern) -> LowerResult<()> {
        if self.function.is_resumable() && pattern.contains_suspend() {
            return unsupported("suspend point inside a destructuring pattern");
        }
        Ok(())
    }

    /// Throw a TypeError when the destructured value is null or undefined
    fn emit_destructure_guard(&mut self, source: TempId, pattern: &Pattern) -> LowerResult<()> {
        let ok = self.new_label();
        let nullish = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::IsNullOrUndefined {
            value: source,
            result: nullish,
        });
        self.emit(LirInstr::BranchIfFalse {
            condition: nullish,
            target: ok,
        });
        let message = match pattern.first_target_name() {
            Some(name) => format!("Cannot destructure property '{}' of null or undefined.", name),
            None => "Cannot destructure null or undefined.".to_string(),
        };
        self.emit_builtin_throw(BuiltInError::TypeError, message)?;
        self.place_label(ok);
        Ok(())
    }
}
