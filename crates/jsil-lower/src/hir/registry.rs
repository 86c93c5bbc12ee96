//! User class registry
//!
//! Declared fields, methods and constructors of user-defined classes, looked up by
//! declaring class name plus member name and arity.

use crate::lir::{CallableId, ValueType};
use std::collections::BTreeMap;

/// Declared instance field
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    /// Declared storage type when the front-end proved one
    pub ty: Option<ValueType>,
}

/// Declared method
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub arity: usize,
    pub is_static: bool,
    /// Every return statement returns `this`
    pub returns_this: bool,
    pub callable: CallableId,
}

/// A user-defined class
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub constructor_arity: usize,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructor_arity: 0,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_field(mut self, name: &str, ty: Option<ValueType>) -> Self {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            ty,
        });
        self
    }

    pub fn with_method(mut self, name: &str, arity: usize, returns_this: bool) -> Self {
        let callable = CallableId::new(format!("{}.{}", self.name, name));
        self.methods.push(MethodInfo {
            name: name.to_string(),
            arity,
            is_static: false,
            returns_this,
            callable,
        });
        self
    }

    pub fn with_static_method(mut self, name: &str, arity: usize) -> Self {
        let callable = CallableId::new(format!("{}.static.{}", self.name, name));
        self.methods.push(MethodInfo {
            name: name.to_string(),
            arity,
            is_static: true,
            returns_this: false,
            callable,
        });
        self
    }

    pub fn with_constructor_arity(mut self, arity: usize) -> Self {
        self.constructor_arity = arity;
        self
    }
}

/// Registry of every user class in the compilation
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, ClassInfo>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Walk `name` and its ancestors, nearest first
    fn lineage<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a ClassInfo> + 'a {
        let mut next = self.classes.get(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .parent
                .as_deref()
                .and_then(|parent| self.classes.get(parent));
            Some(current)
        })
    }

    /// Field declared on `class` or an ancestor
    pub fn field(&self, class: &str, name: &str) -> Option<&FieldInfo> {
        self.lineage(class)
            .find_map(|info| info.fields.iter().find(|field| field.name == name))
    }

    pub fn static_method(&self, class: &str, name: &str, arity: usize) -> Option<&MethodInfo> {
        self.class(class)?
            .methods
            .iter()
            .find(|method| method.is_static && method.name == name && method.arity == arity)
    }

    /// Instance method visible on `class`, with its declaring class
    pub fn instance_method(
        &self,
        class: &str,
        name: &str,
        arity: usize,
    ) -> Option<(&ClassInfo, &MethodInfo)> {
        self.lineage(class).find_map(|info| {
            info.methods
                .iter()
                .find(|method| !method.is_static && method.name == name && method.arity == arity)
                .map(|method| (info, method))
        })
    }

    /// The only instance method with this name and arity across all classes
    pub fn unique_instance_method(
        &self,
        name: &str,
        arity: usize,
    ) -> Option<(&ClassInfo, &MethodInfo)> {
        let mut found = None;
        for class in self.classes.values() {
            for method in &class.methods {
                if !method.is_static && method.name == name && method.arity == arity {
                    if found.is_some() {
                        return None;
                    }
                    found = Some((class, method));
                }
            }
        }
        found
    }

    /// `class` is `ancestor` or derives from it
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        self.lineage(class).any(|info| info.name == ancestor)
    }

    /// Some registered class names `class` as its parent
    pub fn has_subclasses(&self, class: &str) -> bool {
        self.classes
            .values()
            .any(|info| info.parent.as_deref() == Some(class))
    }
}
