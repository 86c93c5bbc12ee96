//! Property and element access
//!
//! Receivers typed as a user class use the declared instance fields directly; arrays
//! and strings get intrinsic length and element access. Everything else goes through
//! the runtime's dynamic property operations.

use crate::error::LowerResult;
use crate::hir::Expr;
use crate::lir::{LirInstr, StorageKind, TempId, ValueStorage, ValueType};
use crate::lower::Lowerer;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_member(
        &mut self,
        object: &Expr,
        property: &str,
        optional: bool,
    ) -> LowerResult<TempId> {
        let object = self.lower_expr(object)?;
        if optional {
            return self.lower_optional_access(object, |this, object| {
                Ok(this.emit_get_property(object, property))
            });
        }
        Ok(self.emit_get_property(object, property))
    }

    pub(crate) fn lower_index(
        &mut self,
        object: &Expr,
        index: &Expr,
        optional: bool,
    ) -> LowerResult<TempId> {
        self.check_no_suspend([index])?;
        let object = self.lower_expr(object)?;
        if optional {
            return self.lower_optional_access(object, |this, object| {
                let key = this.lower_expr(index)?;
                Ok(this.emit_get_item(object, key))
            });
        }
        let key = self.lower_expr(index)?;
        Ok(self.emit_get_item(object, key))
    }

    /// `object?.<access>`: undefined when the receiver is null or undefined
    pub(crate) fn lower_optional_access(
        &mut self,
        object: TempId,
        access: impl FnOnce(&mut Self, TempId) -> LowerResult<TempId>,
    ) -> LowerResult<TempId> {
        let carrier = self.join_carrier("optional", ValueStorage::object());
        let short_circuit = self.new_label();
        let end = self.new_label();

        let value = self.ensure_object(object);
        let nullish = self.new_temp(ValueStorage::bool());
        self.emit(LirInstr::IsNullOrUndefined {
            value,
            result: nullish,
        });
        self.emit(LirInstr::BranchIfTrue {
            condition: nullish,
            target: short_circuit,
        });
        let result = access(self, object)?;
        self.store_carrier(&carrier, result);
        self.emit(LirInstr::Branch { target: end });

        self.place_label(short_circuit);
        let undefined = self.const_undefined();
        self.store_carrier(&carrier, undefined);
        self.place_label(end);
        Ok(self.load_carrier(&carrier))
    }

    /// User class of a receiver with a class-typed reference storage
    pub(crate) fn receiver_class(&self, receiver: TempId) -> Option<String> {
        match self.storage_of(receiver) {
            ValueStorage {
                kind: StorageKind::ObjectReference,
                ty: ValueType::UserClass(class),
            } => Some(class),
            _ => None,
        }
    }

    pub(crate) fn emit_get_property(&mut self, object: TempId, name: &str) -> TempId {
        let registry = self.registry;
        if let Some(class) = self.receiver_class(object) {
            if let Some(field) = registry.field(&class, name) {
                let storage = field
                    .ty
                    .as_ref()
                    .map(ValueStorage::for_type)
                    .unwrap_or_else(ValueStorage::object);
                let result = self.new_temp(storage);
                self.emit(LirInstr::LoadUserClassInstanceField {
                    receiver: object,
                    class,
                    field: name.to_string(),
                    result,
                });
                return result;
            }
        }

        let storage = self.storage_of(object);
        let has_intrinsic_length = storage.kind == StorageKind::ObjectReference
            && matches!(storage.ty, ValueType::Array | ValueType::String);
        if name == "length" && has_intrinsic_length {
            let result = self.new_temp(ValueStorage::double());
            self.emit(LirInstr::GetLength { object, result });
            return result;
        }

        let object = self.ensure_object(object);
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetProperty {
            object,
            name: name.to_string(),
            result,
        });
        result
    }

    pub(crate) fn emit_set_property(&mut self, object: TempId, name: &str, value: TempId) {
        let registry = self.registry;
        if let Some(class) = self.receiver_class(object) {
            if let Some(field) = registry.field(&class, name) {
                let value = self.ensure_object(value);
                self.emit(LirInstr::StoreUserClassInstanceField {
                    receiver: object,
                    class,
                    field: name.to_string(),
                    field_type: field.ty.clone(),
                    value,
                });
                return;
            }
        }
        let object = self.ensure_object(object);
        let value = self.ensure_object(value);
        self.emit(LirInstr::SetProperty {
            object,
            name: name.to_string(),
            value,
        });
    }

    pub(crate) fn emit_get_item(&mut self, object: TempId, key: TempId) -> TempId {
        let storage = self.storage_of(object);
        let is_array =
            storage.kind == StorageKind::ObjectReference && storage.ty == ValueType::Array;
        if is_array && self.storage_of(key).is_unboxed_double() {
            let result = self.new_temp(ValueStorage::object());
            self.emit(LirInstr::GetArrayElement {
                array: object,
                index: key,
                result,
            });
            return result;
        }
        let object = self.ensure_object(object);
        let key = self.ensure_object(key);
        let result = self.new_temp(ValueStorage::object());
        self.emit(LirInstr::GetItem {
            object,
            key,
            result,
        });
        result
    }

    pub(crate) fn emit_set_item(&mut self, object: TempId, key: TempId, value: TempId) {
        let object = self.ensure_object(object);
        let key = self.ensure_object(key);
        let value = self.ensure_object(value);
        self.emit(LirInstr::SetItem { object, key, value });
    }
}
