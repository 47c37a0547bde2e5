//! Unit-aware parsing of user and configuration text.
//!
//! Values such as `"1.5L/min"`, `"273K"`, `"0.979%"` or `"5 V"` are parsed
//! into typed quantities. Unit definitions live in a `UnitRegistry` value that
//! callers construct and pass explicitly; there is no process-wide table.
//!
//! Each unit maps onto its dimension's SI base as `si = value * scale + offset`.

use mf_core::units::{FlowRate, Temperature, Voltage, k, m3ps, volts};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Dimension family a unit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Fractions (canonical: ratio 0-1)
    Dimensionless,
    /// Volumetric flow (canonical: m^3/s)
    FlowRate,
    /// Absolute temperature (canonical: K)
    Temperature,
    /// Electric potential (canonical: V)
    Voltage,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimensionless => write!(f, "dimensionless"),
            Self::FlowRate => write!(f, "flow rate"),
            Self::Temperature => write!(f, "temperature"),
            Self::Voltage => write!(f, "voltage"),
        }
    }
}

/// Error in unit parsing or conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("Unit '{unit}' is a {found}, expected a {expected}")]
    DimensionMismatch {
        unit: String,
        expected: Dimension,
        found: Dimension,
    },

    #[error("Missing unit in '{text}' (expected a {expected})")]
    MissingUnit { text: String, expected: Dimension },

    #[error("Value {value} out of range: {reason}")]
    OutOfRange { value: f64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UnitDef {
    dimension: Dimension,
    scale: f64,
    offset: f64,
}

/// Table of unit symbols used when parsing quantity text.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, UnitDef>,
}

impl UnitRegistry {
    /// Registry with no units; bare numbers still parse as fractions.
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Units commonly found in MFC datasheets and calibration sheets.
    pub fn standard() -> Self {
        const LPM: f64 = 1e-3 / 60.0;
        let mut reg = Self::empty();

        for sym in ["%", "percent"] {
            reg.define(sym, Dimension::Dimensionless, 1e-2, 0.0);
        }
        for sym in ["permille", "‰"] {
            reg.define(sym, Dimension::Dimensionless, 1e-3, 0.0);
        }
        reg.define("ppm", Dimension::Dimensionless, 1e-6, 0.0);
        reg.define("ppb", Dimension::Dimensionless, 1e-9, 0.0);

        for sym in ["L/min", "l/min", "lpm", "slm", "slpm"] {
            reg.define(sym, Dimension::FlowRate, LPM, 0.0);
        }
        for sym in ["mL/min", "ml/min", "sccm", "ccm", "cm3/min", "cm^3/min"] {
            reg.define(sym, Dimension::FlowRate, LPM * 1e-3, 0.0);
        }
        for sym in ["L/s", "l/s"] {
            reg.define(sym, Dimension::FlowRate, 1e-3, 0.0);
        }
        for sym in ["mL/s", "ml/s"] {
            reg.define(sym, Dimension::FlowRate, 1e-6, 0.0);
        }
        for sym in ["L/h", "l/h"] {
            reg.define(sym, Dimension::FlowRate, 1e-3 / 3600.0, 0.0);
        }
        for sym in ["m3/s", "m^3/s"] {
            reg.define(sym, Dimension::FlowRate, 1.0, 0.0);
        }
        for sym in ["m3/h", "m^3/h"] {
            reg.define(sym, Dimension::FlowRate, 1.0 / 3600.0, 0.0);
        }

        for sym in ["K", "kelvin"] {
            reg.define(sym, Dimension::Temperature, 1.0, 0.0);
        }
        for sym in ["C", "°C", "degC", "celsius"] {
            reg.define(sym, Dimension::Temperature, 1.0, 273.15);
        }
        for sym in ["F", "°F", "degF", "fahrenheit"] {
            reg.define(sym, Dimension::Temperature, 5.0 / 9.0, 459.67 * 5.0 / 9.0);
        }

        reg.define("V", Dimension::Voltage, 1.0, 0.0);
        reg.define("mV", Dimension::Voltage, 1e-3, 0.0);
        reg.define("kV", Dimension::Voltage, 1e3, 0.0);

        reg
    }

    /// Add or replace a unit symbol.
    pub fn define(&mut self, symbol: &str, dimension: Dimension, scale: f64, offset: f64) {
        self.units.insert(
            symbol.to_string(),
            UnitDef {
                dimension,
                scale,
                offset,
            },
        );
    }

    pub fn dimension_of(&self, symbol: &str) -> Option<Dimension> {
        self.units.get(symbol).map(|u| u.dimension)
    }

    /// Parse text into the canonical SI magnitude of `expected`.
    ///
    /// Bare numbers are accepted for fractions (ratio), temperatures (K) and
    /// voltages (V). A flow rate always needs a unit.
    pub fn parse(&self, text: &str, expected: Dimension) -> Result<f64, UnitError> {
        let (value, unit) = split_value_and_unit(text)?;

        if unit.is_empty() {
            return match expected {
                Dimension::FlowRate => Err(UnitError::MissingUnit {
                    text: text.trim().to_string(),
                    expected,
                }),
                _ => Ok(value),
            };
        }

        let def = self
            .units
            .get(unit)
            .ok_or_else(|| UnitError::UnknownUnit {
                unit: unit.to_string(),
            })?;

        if def.dimension != expected {
            return Err(UnitError::DimensionMismatch {
                unit: unit.to_string(),
                expected,
                found: def.dimension,
            });
        }

        Ok(value * def.scale + def.offset)
    }

    /// Parse a fraction: `0.01`, `1%`, `400ppm`.
    pub fn parse_fraction(&self, text: &str) -> Result<f64, UnitError> {
        self.parse(text, Dimension::Dimensionless)
    }

    pub fn parse_flow(&self, text: &str) -> Result<FlowRate, UnitError> {
        self.parse(text, Dimension::FlowRate).map(m3ps)
    }

    /// Parse an absolute temperature; rejects values at or below 0 K.
    pub fn parse_temperature(&self, text: &str) -> Result<Temperature, UnitError> {
        let kelvin = self.parse(text, Dimension::Temperature)?;
        if kelvin <= 0.0 {
            return Err(UnitError::OutOfRange {
                value: kelvin,
                reason: "Absolute temperature must be > 0 K".to_string(),
            });
        }
        Ok(k(kelvin))
    }

    pub fn parse_voltage(&self, text: &str) -> Result<Voltage, UnitError> {
        self.parse(text, Dimension::Voltage).map(volts)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Split a value+unit string into (numeric_value, unit_string).
///
/// Examples:
/// - "10ml/min" -> (10.0, "ml/min")
/// - "1.5 L/min" -> (1.5, "L/min")
/// - "0.979%" -> (0.979, "%")
/// - "300" -> (300.0, "")
fn split_value_and_unit(input: &str) -> Result<(f64, &str), UnitError> {
    let trimmed = input.trim();

    // Find where the numeric part ends
    let split_idx = trimmed
        .char_indices()
        .find(|&(i, c)| !is_numeric_char(trimmed, i, c))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());

    let (num_part, unit_part) = trimmed.split_at(split_idx);

    let value: f64 = num_part.trim().parse().map_err(|_| {
        UnitError::ParseError(format!("Could not parse numeric value from '{}'", input))
    })?;

    if !value.is_finite() {
        return Err(UnitError::ParseError(format!(
            "Non-finite value in '{}'",
            input
        )));
    }

    Ok((value, unit_part.trim()))
}

// An 'e'/'E' only continues the number when followed by a digit or sign.
fn is_numeric_char(s: &str, i: usize, c: char) -> bool {
    match c {
        '0'..='9' | '.' | '-' | '+' => true,
        'e' | 'E' if i > 0 => s[i + 1..]
            .chars()
            .next()
            .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+'),
        _ => false,
    }
}
