//! Test fixture for building HIR by hand and lowering it
//!
//! Every test starts from a module `main` with an empty class registry and adds the
//! scopes, bindings and classes it needs.

#![allow(dead_code)]

use jsil_lower::hir::{
    BindingId, BindingKind, ClassInfo, ClassRegistry, FunctionKind, HirFunction, ScopeId,
    ScopeKind, ScopeTree,
};
use jsil_lower::{lower_function, LowerResult, LoweringOptions, MethodBody};

pub struct Fixture {
    pub scopes: ScopeTree,
    pub registry: ClassRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            scopes: ScopeTree::new("main"),
            registry: ClassRegistry::new(),
        }
    }

    /// Function scope declared directly in the module
    pub fn function_scope(&mut self, name: &str) -> ScopeId {
        let global = self.scopes.global();
        self.scopes.add_scope(global, ScopeKind::Function, name)
    }

    pub fn nested_function_scope(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        self.scopes.add_scope(parent, ScopeKind::Function, name)
    }

    pub fn block_scope(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        self.scopes.add_scope(parent, ScopeKind::Block, name)
    }

    pub fn local(&mut self, scope: ScopeId, name: &str) -> BindingId {
        self.scopes.add_binding(scope, name, BindingKind::Let)
    }

    pub fn constant(&mut self, scope: ScopeId, name: &str) -> BindingId {
        self.scopes.add_binding(scope, name, BindingKind::Const)
    }

    pub fn param(&mut self, scope: ScopeId, name: &str, index: u16) -> BindingId {
        self.scopes.add_parameter(scope, name, index)
    }

    /// Reference `binding` from a nested function scope
    pub fn capture(&mut self, from: ScopeId, binding: BindingId) {
        self.scopes.note_reference(from, binding);
    }

    pub fn class(&mut self, class: ClassInfo) {
        self.registry.register(class);
    }

    pub fn function(&self, name: &str, scope: ScopeId) -> HirFunction {
        HirFunction::new(name, FunctionKind::Function, scope)
    }

    pub fn try_lower(&self, function: &HirFunction) -> LowerResult<MethodBody> {
        lower_function(
            function,
            &self.scopes,
            &self.registry,
            &LoweringOptions::unoptimized(),
        )
    }

    /// Lower with every post-lowering pass disabled
    pub fn lower(&self, function: &HirFunction) -> MethodBody {
        self.try_lower(function).expect("lowering failed")
    }

    /// Lower with the default pass pipeline
    pub fn lower_optimized(&self, function: &HirFunction) -> MethodBody {
        lower_function(
            function,
            &self.scopes,
            &self.registry,
            &LoweringOptions::default(),
        )
        .expect("lowering failed")
    }
}

/// Position of the first line containing `needle`
pub fn line_of(output: &str, needle: &str) -> usize {
    output
        .lines()
        .position(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, output))
}
