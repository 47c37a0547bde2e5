//! Composition errors.

use crate::units::UnitError;
use mf_core::MfError;
use thiserror::Error;

/// Result type for composition operations.
pub type CompositionResult<T> = Result<T, CompositionError>;

/// Errors raised while building, resolving or sweeping compositions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositionError {
    #[error("Empty composition")]
    Empty,

    #[error("Invalid gas name '{name}'")]
    InvalidGas { name: String },

    #[error("Gas '{gas}' listed more than once")]
    DuplicateGas { gas: String },

    #[error("Multiple wildcards: {count} gases marked as balance")]
    MultipleWildcards { count: usize },

    #[error("Invalid fraction for {gas}: {value}")]
    InvalidFraction { gas: String, value: f64 },

    #[error("Fractions exceed unity (sum = {sum})")]
    ExceedsUnity { sum: f64 },

    #[error("Fractions do not sum to unity (sum = {sum})")]
    NotNormalized { sum: f64 },

    #[error("Invalid weights: {what}")]
    InvalidWeights { what: &'static str },

    #[error("No conversion factor known for gas '{gas}'")]
    UnknownConversionFactor { gas: String },

    #[error("Invalid sweep: {what}")]
    InvalidSweep { what: String },

    #[error("Cannot parse '{text}': {reason}")]
    Syntax { text: String, reason: String },

    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Numeric(#[from] MfError),
}
