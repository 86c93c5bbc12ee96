//! LIR values: temps, slots, labels and storage descriptors

use serde::Serialize;
use std::fmt;

/// Write-once intermediate value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TempId(pub u32);

impl TempId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Stable, reusable storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Branch target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Symbolic handle of a compiled callable (function, arrow, method)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallableId(pub String);

impl CallableId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Field on a capture object, identified by the owning scope's qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    pub scope: String,
    pub name: String,
}

impl FieldRef {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.name)
    }
}

/// Concrete type carried by a storage descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    /// Any JavaScript value
    Object,
    Double,
    Bool,
    String,
    /// Runtime JavaScript array
    Array,
    /// Bound callable
    Function,
    /// Scope-chain array passed to calls
    ScopesArray,
    /// Capture object of the named scope
    Scope(String),
    /// Instance of a user-defined class
    UserClass(String),
    Iterator,
}

impl ValueType {
    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Double | ValueType::Bool)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Object => write!(f, "object"),
            ValueType::Double => write!(f, "double"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::String => write!(f, "string"),
            ValueType::Array => write!(f, "array"),
            ValueType::Function => write!(f, "function"),
            ValueType::ScopesArray => write!(f, "scopes"),
            ValueType::Scope(name) => write!(f, "scope<{}>", name),
            ValueType::UserClass(name) => write!(f, "class<{}>", name),
            ValueType::Iterator => write!(f, "iterator"),
        }
    }
}

/// How a value is represented on the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageKind {
    UnboxedPrimitive,
    BoxedValue,
    ObjectReference,
    Unknown,
}

/// Storage descriptor of a temp or slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ValueStorage {
    pub kind: StorageKind,
    pub ty: ValueType,
}

impl ValueStorage {
    pub fn unknown() -> Self {
        Self {
            kind: StorageKind::Unknown,
            ty: ValueType::Object,
        }
    }

    pub fn unboxed(ty: ValueType) -> Self {
        Self {
            kind: StorageKind::UnboxedPrimitive,
            ty,
        }
    }

    pub fn boxed(ty: ValueType) -> Self {
        Self {
            kind: StorageKind::BoxedValue,
            ty,
        }
    }

    pub fn reference(ty: ValueType) -> Self {
        Self {
            kind: StorageKind::ObjectReference,
            ty,
        }
    }

    /// Reference to an arbitrary JavaScript value
    pub fn object() -> Self {
        Self::reference(ValueType::Object)
    }

    pub fn double() -> Self {
        Self::unboxed(ValueType::Double)
    }

    pub fn bool() -> Self {
        Self::unboxed(ValueType::Bool)
    }

    pub fn string() -> Self {
        Self::reference(ValueType::String)
    }

    /// Storage for a binding or field whose type is statically known
    pub fn for_type(ty: &ValueType) -> Self {
        if ty.is_primitive() {
            Self::unboxed(ty.clone())
        } else {
            Self::reference(ty.clone())
        }
    }

    pub fn is_unboxed(&self) -> bool {
        self.kind == StorageKind::UnboxedPrimitive
    }

    pub fn is_unboxed_double(&self) -> bool {
        self.is_unboxed() && self.ty == ValueType::Double
    }

    pub fn is_unboxed_bool(&self) -> bool {
        self.is_unboxed() && self.ty == ValueType::Bool
    }

    pub fn is_string(&self) -> bool {
        self.kind == StorageKind::ObjectReference && self.ty == ValueType::String
    }

    /// Uniform object-shaped operand: boxed or reference
    pub fn is_object_shaped(&self) -> bool {
        matches!(
            self.kind,
            StorageKind::BoxedValue | StorageKind::ObjectReference
        )
    }
}

impl fmt::Display for ValueStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StorageKind::UnboxedPrimitive => write!(f, "{}", self.ty),
            StorageKind::BoxedValue => write!(f, "box<{}>", self.ty),
            StorageKind::ObjectReference => write!(f, "ref<{}>", self.ty),
            StorageKind::Unknown => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_ids() {
        assert_eq!(TempId(3).to_string(), "t3");
        assert_eq!(SlotId(0).to_string(), "v0");
        assert_eq!(LabelId(12).to_string(), "L12");
        assert_eq!(FieldRef::new("main/f", "x").to_string(), "main/f::x");
    }

    #[test]
    fn test_storage_for_type() {
        assert!(ValueStorage::for_type(&ValueType::Double).is_unboxed_double());
        assert!(ValueStorage::for_type(&ValueType::Bool).is_unboxed_bool());
        assert!(ValueStorage::for_type(&ValueType::String).is_string());
        let class = ValueStorage::for_type(&ValueType::UserClass("Point".into()));
        assert!(class.is_object_shaped());
        assert!(!class.is_unboxed());
    }

    #[test]
    fn test_unknown_is_not_object_shaped() {
        assert!(!ValueStorage::unknown().is_object_shaped());
        assert!(ValueStorage::boxed(ValueType::Double).is_object_shaped());
        assert_eq!(ValueStorage::boxed(ValueType::Double).to_string(), "box<double>");
    }
}
