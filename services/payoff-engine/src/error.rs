//! Engine error types

use thiserror::Error;

/// Errors raised while building instruments or evaluating payoffs
#[derive(Debug, Error)]
pub enum EngineError {
    /// Construction-time parameter violation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Liquidity range with a lower bound not strictly below the upper bound
    #[error("Invalid range: lower price {lower} must be less than upper price {upper}")]
    InvalidRange {
        /// Lower price bound
        lower: f64,
        /// Upper price bound
        upper: f64,
    },

    /// Option kind or side outside the two-value enums
    #[error("Invalid instrument kind: {0}")]
    InvalidInstrumentKind(String),

    /// Iterative solver gave up before reaching tolerance
    #[error("Solver did not converge after {iterations} iterations")]
    ConvergenceFailure {
        /// Iterations performed before giving up
        iterations: usize,
    },

    /// Persisted position with a type tag outside option/future/uniswap_v3
    #[error("Unknown position variant: {0}")]
    UnknownVariant(String),

    /// Price grid that cannot be valued
    #[error("Invalid price grid: {0}")]
    InvalidPriceGrid(String),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

pub(crate) fn validate_positive(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter(format!("{name} must be positive, got {value}")))
    }
}

pub(crate) fn validate_non_negative(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter(format!("{name} must be non-negative, got {value}")))
    }
}

pub(crate) fn validate_finite(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter(format!("{name} must be finite, got {value}")))
    }
}
