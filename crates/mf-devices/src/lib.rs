//! mf-devices: calibrated mass-flow controllers and gas lines.
//!
//! A [`Controller`] owns a date-ordered history of [`Calibration`]s. Each
//! calibration wraps a [`CalibrationCurve`] built from a method tag by a
//! [`MethodRegistry`]. A [`Line`] binds a gas composition to one selected
//! calibration.

pub mod calibration;
pub mod controller;
pub mod error;
pub mod line;
pub mod method;

pub use calibration::{Calibration, Conditions, SetpointRange};
pub use controller::{CalibrationSelector, Connection, Controller, ControllerInfo, ControllerSet};
pub use error::{CalibrationError, CalibrationResult};
pub use line::{Binding, Line};
pub use method::{CalibrationCurve, Curve, CurveBuilder, Linear, MethodParams, MethodRegistry};
