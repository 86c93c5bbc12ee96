//! JavaScript HIR to LIR lowering
//!
//! The middle tier of an ahead-of-time JavaScript compiler. Takes one resolved function
//! body (HIR), a scope tree with capture analysis and the user class registry, and
//! produces a flat, temp-based LIR body ready for bytecode emission.
//!
//! # Pipeline
//!
//! ```text
//! HirFunction + ScopeTree + ClassRegistry
//!     -> lower::Lowerer          (expressions, control flow, closures, resumable state)
//!     -> optimize::run_passes    (coercion CSE, type normalization, member calls)
//!     -> MethodBody
//! ```
//!
//! Lowering is all-or-nothing per body: any construct the fast path cannot express
//! yields [`Unsupported`] and the caller falls back to its general compiler.

pub mod error;
pub mod hir;
pub mod lir;
pub mod lower;
pub mod optimize;
pub mod options;

pub use error::{LowerResult, OptionsError, Unsupported};
pub use lir::{MethodBody, PrettyPrint};
pub use lower::Lowerer;
pub use options::LoweringOptions;

use hir::{ClassRegistry, HirFunction, ScopeTree};

/// Lower one function body and run the enabled post-lowering passes.
pub fn lower_function(
    function: &HirFunction,
    scopes: &ScopeTree,
    registry: &ClassRegistry,
    options: &LoweringOptions,
) -> LowerResult<MethodBody> {
    let mut body = Lowerer::new(function, scopes, registry, options).lower()?;
    optimize::run_passes(&mut body, registry, options);
    Ok(body)
}
