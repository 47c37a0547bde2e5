//! Gas identifiers and thermal conversion factors.

use crate::error::{CompositionError, CompositionResult};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;

/// Token marking the balance gas in raw compositions.
pub const WILDCARD: &str = "*";

/// Opaque gas species identifier ("N2", "NH3", ...).
///
/// Only equality, hashing and ordering are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gas(String);

impl Gas {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject names that would be ambiguous in composition text.
    pub fn validate(&self) -> CompositionResult<()> {
        let name = self.0.as_str();
        let bad = name.is_empty()
            || name == WILDCARD
            || name
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '=' | ',' | ';' | ':'));
        if bad {
            return Err(CompositionError::InvalidGas {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl From<&str> for Gas {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Gas {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Deref for Gas {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Gas {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thermal mass-flow-controller conversion factors, relative to N2.
///
/// A thermal MFC calibrated on gas A reads gas B scaled by `CF(B) / CF(A)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionFactors {
    table: HashMap<Gas, f64>,
}

impl ConversionFactors {
    /// An empty table; every lookup fails until factors are inserted.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Commonly published factors for thermal MFCs at 0 °C, 1 atm.
    pub fn standard() -> Self {
        const STANDARD: [(&str, f64); 22] = [
            ("N2", 1.000),
            ("Air", 1.000),
            ("O2", 0.993),
            ("Ar", 1.395),
            ("He", 1.386),
            ("Ne", 1.460),
            ("Kr", 1.543),
            ("Xe", 1.320),
            ("H2", 1.008),
            ("CO", 0.995),
            ("CO2", 0.740),
            ("NO", 0.990),
            ("NO2", 0.740),
            ("N2O", 0.710),
            ("NH3", 0.730),
            ("CH4", 0.719),
            ("C2H6", 0.500),
            ("C2H4", 0.600),
            ("C3H8", 0.360),
            ("SO2", 0.690),
            ("H2S", 0.840),
            ("Cl2", 0.860),
        ];
        let table = STANDARD
            .iter()
            .map(|(gas, cf)| (Gas::from(*gas), *cf))
            .collect();
        Self { table }
    }

    /// Add or replace a factor. Non-positive factors are rejected.
    pub fn insert(&mut self, gas: impl Into<Gas>, cf: f64) -> CompositionResult<()> {
        let gas = gas.into();
        gas.validate()?;
        if !(cf > 0.0 && cf.is_finite()) {
            return Err(CompositionError::InvalidFraction {
                gas: gas.to_string(),
                value: cf,
            });
        }
        self.table.insert(gas, cf);
        Ok(())
    }

    pub fn get(&self, gas: &str) -> Option<f64> {
        self.table.get(gas).copied()
    }

    pub fn require(&self, gas: &str) -> CompositionResult<f64> {
        self.get(gas)
            .ok_or_else(|| CompositionError::UnknownConversionFactor {
                gas: gas.to_string(),
            })
    }
}

impl Default for ConversionFactors {
    fn default() -> Self {
        Self::standard()
    }
}
