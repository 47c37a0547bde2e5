//! Error types for calibrations and controllers.

use chrono::NaiveDate;
use mf_core::MfError;
use mf_gas::CompositionError;
use thiserror::Error;

pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Errors raised by calibration curves, controllers and line binding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Unknown calibration method '{method}'")]
    UnknownMethod { method: String },

    #[error("Calibration method '{method}' requires parameter '{parameter}'")]
    MissingParameter { method: String, parameter: String },

    #[error("Invalid calibration parameter {parameter}: {value}")]
    InvalidParameter { parameter: String, value: f64 },

    #[error("Calibration is not invertible (slope {slope} L/min)")]
    NonInvertible { slope: f64 },

    #[error("Setpoint {setpoint} outside range [{min}, {max}]")]
    SetpointOutOfRange { setpoint: f64, min: f64, max: f64 },

    #[error("Invalid setpoint range: {what}")]
    InvalidRange { what: &'static str },

    #[error("Invalid temperature: {kelvin} K")]
    InvalidTemperature { kelvin: f64 },

    #[error("Controller '{controller}' has no calibrations")]
    NoCalibrations { controller: String },

    #[error("Controller '{controller}' has no calibration on or before {date}")]
    NoCalibrationBefore { controller: String, date: NaiveDate },

    #[error("Controller '{controller}' already has a calibration dated {date}")]
    DuplicateDate { controller: String, date: NaiveDate },

    #[error("Duplicate controller name '{name}'")]
    DuplicateController { name: String },

    #[error("Unknown controller '{name}'")]
    UnknownController { name: String },

    #[error("Gas error: {0}")]
    Gas(#[from] CompositionError),

    #[error(transparent)]
    Numeric(#[from] MfError),
}
