//! Error types for mixture resolution.

use mf_core::MfError;
use mf_devices::CalibrationError;
use mf_gas::CompositionError;
use thiserror::Error;

/// Errors that can occur while distributing a mixture across lines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixtureError {
    #[error("No lines to mix from")]
    NoLines,

    #[error("Gas '{gas}' is not carried by any line")]
    UndeliverableGas { gas: String },

    #[error("Target mixture cannot be produced: {what}")]
    Unachievable { what: String },

    #[error("Invalid request: {what}")]
    InvalidRequest { what: &'static str },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    #[error("Line '{line}': {source}")]
    LineCalibration {
        line: String,
        #[source]
        source: CalibrationError,
    },

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Resolver configuration: {0}")]
    Config(#[from] MfError),
}

pub type MixtureResult<T> = Result<T, MixtureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn line_calibration_keeps_source() {
        let err = MixtureError::LineCalibration {
            line: "ammonia".into(),
            source: CalibrationError::NonInvertible { slope: 0.0 },
        };
        assert!(err.to_string().contains("ammonia"));
        assert!(err.source().is_some());
    }
}
