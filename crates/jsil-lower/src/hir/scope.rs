//! Lexical scopes and bindings
//!
//! The scope tree is produced by the front-end's binding resolver. It records which
//! bindings are captured by nested functions and which function scopes read variables of
//! an enclosing function; the lowering engine derives every storage decision from it.

use crate::lir::{CallableId, ValueType};
use serde::Serialize;

/// Scope identifier (index into the scope tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u32);

/// Binding identifier (index into the binding table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Module top level
    Global,
    /// Function, arrow, method or constructor body
    Function,
    /// Block, loop head, catch clause
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Parameter,
    Class,
    CatchParameter,
}

/// A resolved source-level identifier
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// Declaring scope
    pub scope: ScopeId,
    /// Referenced from a nested function
    pub captured: bool,
    /// Type proven stable for the binding's whole lifetime
    pub stable_type: Option<ValueType>,
    /// Position in the parameter list, for simple parameters
    pub param_index: Option<u16>,
    /// Compiled callable for function declarations never reassigned
    pub callable: Option<CallableId>,
    /// Own scope of that callable
    pub function_scope: Option<ScopeId>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    /// Module-qualified name (`main`, `main/outer`, `main/outer/for1`)
    pub name: String,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub bindings: Vec<BindingId>,
    /// Reads or writes a binding of an enclosing function
    pub references_parent_scope_variables: bool,
}

/// Scope tree plus binding table for one module
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
}

impl ScopeTree {
    /// Create a tree holding only the module's global scope
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            scopes: vec![Scope {
                name: module_name.into(),
                kind: ScopeKind::Global,
                parent: None,
                bindings: Vec::new(),
                references_parent_scope_variables: false,
            }],
            bindings: Vec::new(),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn add_scope(&mut self, parent: ScopeId, kind: ScopeKind, name: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let qualified = format!("{}/{}", self.scope(parent).name, name);
        self.scopes.push(Scope {
            name: qualified,
            kind,
            parent: Some(parent),
            bindings: Vec::new(),
            references_parent_scope_variables: false,
        });
        id
    }

    pub fn add_binding(&mut self, scope: ScopeId, name: &str, kind: BindingKind) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        self.bindings.push(Binding {
            name: name.to_string(),
            kind,
            scope,
            captured: false,
            stable_type: None,
            param_index: None,
            callable: None,
            function_scope: None,
        });
        self.scopes[scope.0 as usize].bindings.push(id);
        id
    }

    pub fn add_parameter(&mut self, scope: ScopeId, name: &str, index: u16) -> BindingId {
        let id = self.add_binding(scope, name, BindingKind::Parameter);
        self.bindings[id.0 as usize].param_index = Some(index);
        id
    }

    pub fn set_stable_type(&mut self, binding: BindingId, ty: ValueType) {
        self.bindings[binding.0 as usize].stable_type = Some(ty);
    }

    pub fn set_callable(&mut self, binding: BindingId, callable: CallableId, scope: ScopeId) {
        let data = &mut self.bindings[binding.0 as usize];
        data.callable = Some(callable);
        data.function_scope = Some(scope);
    }

    /// Record a reference to `binding` from code in scope `from`.
    ///
    /// A reference crossing a function boundary marks the binding captured and marks
    /// every function scope between the reference and the declaration as reading
    /// enclosing variables.
    pub fn note_reference(&mut self, from: ScopeId, binding: BindingId) {
        let declaring_function = self.enclosing_function(self.binding(binding).scope);
        let mut current = self.enclosing_function(from);
        if current == declaring_function {
            return;
        }
        self.bindings[binding.0 as usize].captured = true;
        while current != declaring_function {
            let scope = &mut self.scopes[current.0 as usize];
            if scope.kind == ScopeKind::Function {
                scope.references_parent_scope_variables = true;
            }
            match scope.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    /// Nearest function or global scope containing `scope` (inclusive)
    pub fn enclosing_function(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        loop {
            let data = self.scope(current);
            match (data.kind, data.parent) {
                (ScopeKind::Function | ScopeKind::Global, _) | (_, None) => return current,
                (ScopeKind::Block, Some(parent)) => current = parent,
            }
        }
    }

    /// Root scope of the module
    pub fn root(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while let Some(parent) = self.scope(current).parent {
            current = parent;
        }
        current
    }

    /// Scope has a runtime capture object: the global scope always does, other scopes
    /// when they declare a captured binding
    pub fn has_capture_object(&self, scope: ScopeId) -> bool {
        let data = self.scope(scope);
        data.kind == ScopeKind::Global
            || data
                .bindings
                .iter()
                .any(|binding| self.binding(*binding).captured)
    }

    /// Captured bindings declared directly in `scope`, in declaration order
    pub fn captured_bindings(&self, scope: ScopeId) -> Vec<BindingId> {
        self.scope(scope)
            .bindings
            .iter()
            .copied()
            .filter(|binding| self.binding(*binding).captured)
            .collect()
    }

    /// Scope-chain layout a function receives: the enclosing function's own layout,
    /// then the scopes with capture objects between that function and this one,
    /// outermost first. Empty when the function never reads enclosing variables.
    pub fn chain_layout(&self, function_scope: ScopeId) -> Vec<ScopeId> {
        let data = self.scope(function_scope);
        let Some(parent) = data.parent else {
            return Vec::new();
        };
        if !data.references_parent_scope_variables {
            return Vec::new();
        }
        let enclosing = self.enclosing_function(parent);

        let mut local = Vec::new();
        let mut current = Some(parent);
        while let Some(scope) = current {
            if self.has_capture_object(scope) {
                local.push(scope);
            }
            if scope == enclosing {
                break;
            }
            current = self.scope(scope).parent;
        }
        local.reverse();

        let mut layout = if self.scope(enclosing).kind == ScopeKind::Global {
            Vec::new()
        } else {
            self.chain_layout(enclosing)
        };
        layout.extend(local);
        layout
    }

    /// `ancestor` is `scope` or one of its parents
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let mut tree = ScopeTree::new("main");
        let outer = tree.add_scope(tree.global(), ScopeKind::Function, "outer");
        let block = tree.add_scope(outer, ScopeKind::Block, "for1");
        assert_eq!(tree.scope(block).name, "main/outer/for1");
        assert_eq!(tree.enclosing_function(block), outer);
    }

    #[test]
    fn test_note_reference_marks_capture_and_parents() {
        let mut tree = ScopeTree::new("main");
        let outer = tree.add_scope(tree.global(), ScopeKind::Function, "outer");
        let x = tree.add_binding(outer, "x", BindingKind::Let);
        let middle = tree.add_scope(outer, ScopeKind::Function, "middle");
        let inner = tree.add_scope(middle, ScopeKind::Function, "inner");

        tree.note_reference(inner, x);

        assert!(tree.binding(x).captured);
        assert!(tree.scope(inner).references_parent_scope_variables);
        assert!(tree.scope(middle).references_parent_scope_variables);
        assert!(!tree.scope(outer).references_parent_scope_variables);
    }

    #[test]
    fn test_same_function_reference_is_not_capture() {
        let mut tree = ScopeTree::new("main");
        let f = tree.add_scope(tree.global(), ScopeKind::Function, "f");
        let block = tree.add_scope(f, ScopeKind::Block, "block1");
        let x = tree.add_binding(f, "x", BindingKind::Let);
        tree.note_reference(block, x);
        assert!(!tree.binding(x).captured);
    }

    #[test]
    fn test_chain_layout_skips_scopes_without_capture_objects() {
        let mut tree = ScopeTree::new("main");
        let outer = tree.add_scope(tree.global(), ScopeKind::Function, "outer");
        let plain_block = tree.add_scope(outer, ScopeKind::Block, "block1");
        let x = tree.add_binding(outer, "x", BindingKind::Let);
        let inner = tree.add_scope(plain_block, ScopeKind::Function, "inner");
        tree.note_reference(inner, x);

        assert_eq!(tree.chain_layout(inner), vec![outer]);
    }

    #[test]
    fn test_chain_layout_extends_enclosing_layout() {
        let mut tree = ScopeTree::new("main");
        let g = tree.add_binding(tree.global(), "g", BindingKind::Let);
        let outer = tree.add_scope(tree.global(), ScopeKind::Function, "outer");
        let x = tree.add_binding(outer, "x", BindingKind::Let);
        let inner = tree.add_scope(outer, ScopeKind::Function, "inner");
        tree.note_reference(inner, x);
        tree.note_reference(inner, g);

        assert_eq!(tree.chain_layout(outer), vec![tree.global()]);
        assert_eq!(tree.chain_layout(inner), vec![tree.global(), outer]);
    }

    #[test]
    fn test_chain_layout_empty_without_parent_references() {
        let mut tree = ScopeTree::new("main");
        let f = tree.add_scope(tree.global(), ScopeKind::Function, "f");
        assert!(tree.chain_layout(f).is_empty());
    }
}
