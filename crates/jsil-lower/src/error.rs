//! Lowering errors

use thiserror::Error;

/// Result of any lowering step.
pub type LowerResult<T> = Result<T, Unsupported>;

/// The fast lowering path declined the function body.
///
/// Carries no payload: the caller discards everything produced for the body and
/// recompiles it with the general strategy. The reason is logged at the decline site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("construct not supported by the fast lowering path")]
pub struct Unsupported;

/// Errors raised while loading [`LoweringOptions`](crate::LoweringOptions).
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Invalid lowering options: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Log a decline reason and fail.
///
/// Every `Err(Unsupported)` in the lowering engine originates here, so the debug log
/// holds exactly one line per declined body.
pub(crate) fn unsupported<T>(reason: impl std::fmt::Display) -> LowerResult<T> {
    tracing::debug!(%reason, "lowering declined");
    Err(Unsupported)
}
