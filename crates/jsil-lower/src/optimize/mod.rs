//! LIR Optimization Passes
//!
//! Local rewrites run once over each lowered body before emission.

mod coercion_cse;
mod member_call;
mod type_normalize;

pub use coercion_cse::CoercionCse;
pub use member_call::MemberCallNormalizer;
pub use type_normalize::TypeNormalizer;

use crate::hir::ClassRegistry;
use crate::lir::MethodBody;
use crate::options::LoweringOptions;

/// Rewrite counts of one optimization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Coercions replaced by copies
    pub coercions_reused: usize,
    /// Storage peepholes applied
    pub types_normalized: usize,
    /// Dynamic member calls made early-bound
    pub member_calls_bound: usize,
}

/// Run the passes enabled in `options`.
///
/// Type normalization runs before member-call normalization so that receivers typed
/// by construction are visible to it.
pub fn run_passes(
    body: &mut MethodBody,
    registry: &ClassRegistry,
    options: &LoweringOptions,
) -> PassStats {
    let mut stats = PassStats::default();

    if options.coercion_cse {
        stats.coercions_reused = CoercionCse::new().run(body);
    }
    if options.type_normalization {
        stats.types_normalized = TypeNormalizer::new().run(body);
    }
    if options.member_call_normalization {
        stats.member_calls_bound = MemberCallNormalizer::new(registry).run(body);
    }

    tracing::trace!(
        function = %body.name,
        coercions = stats.coercions_reused,
        types = stats.types_normalized,
        member_calls = stats.member_calls_bound,
        "optimization passes finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lir::{LirInstr, TempId, ValueStorage, ValueType};

    #[test]
    fn test_disabled_passes_leave_body_untouched() {
        let mut body = MethodBody::new("f");
        body.temps = vec![
            Some(ValueStorage::reference(ValueType::Array)),
            Some(ValueStorage::reference(ValueType::Array)),
        ];
        body.instructions = vec![LirInstr::NormalizeIterable {
            source: TempId(0),
            result: TempId(1),
        }];
        let before = body.clone();

        let stats = run_passes(
            &mut body,
            &ClassRegistry::new(),
            &LoweringOptions::unoptimized(),
        );
        assert_eq!(stats, PassStats::default());
        assert_eq!(body, before);
    }
}
