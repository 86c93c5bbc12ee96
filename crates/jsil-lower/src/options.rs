//! Lowering configuration

use crate::error::OptionsError;
use serde::Deserialize;

/// Largest argument count with an arity-specialized call instruction.
pub const MAX_FIXED_CALL_ARITY: usize = 3;

/// Options controlling the lowering engine and its post-lowering passes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoweringOptions {
    /// Deduplicate pure coercions of unboxed primitives within a basic block
    pub coercion_cse: bool,
    /// Peephole storage normalization (typed field stores, class result typing)
    pub type_normalization: bool,
    /// Upgrade dynamic member calls to early-bound calls when the receiver is known
    pub member_call_normalization: bool,
    /// Calls with up to this many plain arguments use the fixed-arity call forms
    pub max_fixed_call_arity: usize,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            coercion_cse: true,
            type_normalization: true,
            member_call_normalization: true,
            max_fixed_call_arity: MAX_FIXED_CALL_ARITY,
        }
    }
}

impl LoweringOptions {
    /// All post-lowering passes disabled.
    pub fn unoptimized() -> Self {
        Self {
            coercion_cse: false,
            type_normalization: false,
            member_call_normalization: false,
            ..Self::default()
        }
    }

    /// Parse options from a JSON object; missing keys keep their defaults.
    pub fn from_json(source: &str) -> Result<Self, OptionsError> {
        let options: LoweringOptions = serde_json::from_str(source)?;
        if options.max_fixed_call_arity > MAX_FIXED_CALL_ARITY {
            return Err(OptionsError::InvalidValue {
                field: "maxFixedCallArity",
                message: format!(
                    "{} exceeds the largest fixed-arity call form ({})",
                    options.max_fixed_call_arity, MAX_FIXED_CALL_ARITY
                ),
            });
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_all_passes() {
        let options = LoweringOptions::default();
        assert!(options.coercion_cse);
        assert!(options.type_normalization);
        assert!(options.member_call_normalization);
        assert_eq!(options.max_fixed_call_arity, 3);
    }

    #[test]
    fn test_from_json_partial() {
        let options = LoweringOptions::from_json(r#"{ "coercionCse": false }"#).unwrap();
        assert!(!options.coercion_cse);
        assert!(options.type_normalization);
    }

    #[test]
    fn test_from_json_rejects_large_arity() {
        let err = LoweringOptions::from_json(r#"{ "maxFixedCallArity": 7 }"#).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(matches!(
            LoweringOptions::from_json("{ nope"),
            Err(OptionsError::Json(_))
        ));
    }

    #[test]
    fn test_unoptimized() {
        let options = LoweringOptions::unoptimized();
        assert!(!options.coercion_cse && !options.type_normalization);
        assert!(!options.member_call_normalization);
    }
}
