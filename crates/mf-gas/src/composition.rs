//! Gas compositions: raw (possibly wildcarded) input and resolved fractions.

use crate::error::{CompositionError, CompositionResult};
use crate::gas::{ConversionFactors, Gas, WILDCARD};
use crate::units::UnitRegistry;
use mf_core::numeric::{FRACTION_EPS, Tolerances, ensure_finite, nearly_equal};
use std::collections::HashSet;
use std::fmt;

/// Amount of one gas in a raw composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    /// Explicit mole fraction (ratio, not percent).
    Fraction(f64),
    /// Whatever remains after the explicit fractions.
    Balance,
}

impl Amount {
    /// Parse `"*"`, `"0.01"`, `"1%"`, `"400ppm"`.
    pub fn parse(text: &str, units: &UnitRegistry) -> CompositionResult<Self> {
        let text = text.trim();
        if text == WILDCARD {
            return Ok(Self::Balance);
        }
        Ok(Self::Fraction(units.parse_fraction(text)?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fraction(x) => write!(f, "{x}"),
            Self::Balance => f.write_str(WILDCARD),
        }
    }
}

/// Unresolved composition exactly as entered, in insertion order.
///
/// Nothing is validated until [`resolve`] runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawComposition {
    entries: Vec<(Gas, Amount)>,
}

impl RawComposition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(Gas, Amount)>) -> Self {
        Self { entries }
    }

    /// Builder: append an explicit fraction.
    pub fn fraction(mut self, gas: impl Into<Gas>, value: f64) -> Self {
        self.entries.push((gas.into(), Amount::Fraction(value)));
        self
    }

    /// Builder: append the balance gas.
    pub fn balance(mut self, gas: impl Into<Gas>) -> Self {
        self.entries.push((gas.into(), Amount::Balance));
        self
    }

    pub fn push(&mut self, gas: impl Into<Gas>, amount: Amount) {
        self.entries.push((gas.into(), amount));
    }

    /// Replace the amount of `gas`, or append it when absent.
    pub fn set(&mut self, gas: &Gas, amount: Amount) {
        match self.entries.iter_mut().find(|(g, _)| g == gas) {
            Some(entry) => entry.1 = amount,
            None => self.entries.push((gas.clone(), amount)),
        }
    }

    /// Parse the text form `"NH3=0.979%, He=*"`.
    pub fn parse(text: &str, units: &UnitRegistry) -> CompositionResult<Self> {
        let mut raw = Self::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (gas, amount) = part.split_once('=').ok_or_else(|| CompositionError::Syntax {
                text: part.to_string(),
                reason: "expected GAS=AMOUNT".to_string(),
            })?;
            let gas = Gas::from(gas.trim());
            gas.validate()?;
            raw.push(gas, Amount::parse(amount, units)?);
        }
        if raw.entries.is_empty() {
            return Err(CompositionError::Empty);
        }
        Ok(raw)
    }

    pub fn entries(&self) -> &[(Gas, Amount)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, gas: &str) -> bool {
        self.entries.iter().any(|(g, _)| g.as_str() == gas)
    }

    /// The gas marked as balance, if any. Fails on more than one.
    pub fn balance_gas(&self) -> CompositionResult<Option<&Gas>> {
        let mut wildcards = self
            .entries
            .iter()
            .filter(|(_, a)| matches!(a, Amount::Balance))
            .map(|(g, _)| g);
        let first = wildcards.next();
        let extra = wildcards.count();
        if extra > 0 {
            return Err(CompositionError::MultipleWildcards { count: extra + 1 });
        }
        Ok(first)
    }

    /// Explicit (non-balance) entries.
    pub fn explicit(&self) -> impl Iterator<Item = (&Gas, f64)> + '_ {
        self.entries.iter().filter_map(|(g, a)| match a {
            Amount::Fraction(x) => Some((g, *x)),
            Amount::Balance => None,
        })
    }

    pub fn resolve(&self) -> CompositionResult<Composition> {
        resolve(self)
    }
}

impl fmt::Display for RawComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (gas, amount)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{gas}={amount}")?;
        }
        Ok(())
    }
}

/// Resolve a raw composition into concrete fractions.
///
/// The balance gas receives `1 - S` where `S` is the sum of explicit
/// fractions; without a balance gas the explicit fractions must already sum
/// to one. Gas order is preserved.
pub fn resolve(raw: &RawComposition) -> CompositionResult<Composition> {
    if raw.entries.is_empty() {
        return Err(CompositionError::Empty);
    }

    let mut seen = HashSet::with_capacity(raw.entries.len());
    for (gas, amount) in &raw.entries {
        gas.validate()?;
        if !seen.insert(gas) {
            return Err(CompositionError::DuplicateGas {
                gas: gas.to_string(),
            });
        }
        if let Amount::Fraction(x) = amount {
            if !x.is_finite() || *x < 0.0 {
                return Err(CompositionError::InvalidFraction {
                    gas: gas.to_string(),
                    value: *x,
                });
            }
        }
    }

    let balance_with = raw.balance_gas()?;
    let sum: f64 = raw.explicit().map(|(_, x)| x).sum();

    if sum > 1.0 + FRACTION_EPS {
        return Err(CompositionError::ExceedsUnity { sum });
    }

    let remainder = match balance_with {
        Some(_) => {
            let rest = 1.0 - sum;
            if rest.abs() <= FRACTION_EPS { 0.0 } else { rest }
        }
        None => {
            if !nearly_equal(sum, 1.0, Tolerances::fraction()) {
                return Err(CompositionError::NotNormalized { sum });
            }
            0.0
        }
    };

    let items = raw
        .entries
        .iter()
        .map(|(gas, amount)| match amount {
            Amount::Fraction(x) => (gas.clone(), *x),
            Amount::Balance => (gas.clone(), remainder),
        })
        .collect();

    Ok(Composition { items })
}

/// Resolved composition: fractions in [0, 1] summing to one.
///
/// Immutable; only produced by [`resolve`] or the constructors below.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    items: Vec<(Gas, f64)>,
}

impl Composition {
    /// Create a pure-gas composition.
    pub fn pure(gas: impl Into<Gas>) -> Self {
        Self {
            items: vec![(gas.into(), 1.0)],
        }
    }

    /// Create from explicit fractions that must already sum to one.
    pub fn from_fractions<G: Into<Gas>>(
        fractions: impl IntoIterator<Item = (G, f64)>,
    ) -> CompositionResult<Self> {
        let raw = RawComposition::from_entries(
            fractions
                .into_iter()
                .map(|(g, x)| (g.into(), Amount::Fraction(x)))
                .collect(),
        );
        resolve(&raw)
    }

    /// Flow-weighted average of several compositions.
    ///
    /// Weights must be non-negative with a positive total; the result is
    /// normalized by that total. Gases appear in order of first occurrence.
    pub fn compose<'a>(
        parts: impl IntoIterator<Item = (&'a Composition, f64)>,
    ) -> CompositionResult<Self> {
        let mut items: Vec<(Gas, f64)> = Vec::new();
        let mut total = 0.0;
        for (comp, weight) in parts {
            ensure_finite(weight, "composition weight")?;
            if weight < 0.0 {
                return Err(CompositionError::InvalidWeights {
                    what: "negative weight",
                });
            }
            total += weight;
            for (gas, x) in comp.iter() {
                match items.iter_mut().find(|(g, _)| g == gas) {
                    Some(entry) => entry.1 += weight * x,
                    None => items.push((gas.clone(), weight * x)),
                }
            }
        }
        if items.is_empty() {
            return Err(CompositionError::Empty);
        }
        if total <= 0.0 {
            return Err(CompositionError::InvalidWeights {
                what: "weights sum to zero",
            });
        }
        for item in &mut items {
            item.1 /= total;
        }
        Ok(Self { items })
    }

    /// Mole fraction of a gas (0.0 if not present).
    pub fn fraction(&self, gas: &str) -> f64 {
        self.items
            .iter()
            .find(|(g, _)| g.as_str() == gas)
            .map(|(_, x)| *x)
            .unwrap_or(0.0)
    }

    pub fn contains(&self, gas: &str) -> bool {
        self.items.iter().any(|(g, _)| g.as_str() == gas)
    }

    /// Returns the gas if this composition is a single pure gas.
    pub fn is_pure(&self) -> Option<&Gas> {
        match self.items.as_slice() {
            [(gas, _)] => Some(gas),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Gas, f64)> + '_ {
        self.items.iter().map(|(g, x)| (g, *x))
    }

    pub fn gases(&self) -> impl Iterator<Item = &Gas> + '_ {
        self.items.iter().map(|(g, _)| g)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Largest absolute fraction difference over the union of both gas sets.
    pub fn max_deviation(&self, other: &Composition) -> f64 {
        self.gases()
            .chain(other.gases())
            .map(|g| (self.fraction(g) - other.fraction(g)).abs())
            .fold(0.0, f64::max)
    }

    /// Thermal conversion factor of the mixture: `Σx / Σ(x_i / CF_i)`.
    pub fn conversion_factor(&self, table: &ConversionFactors) -> CompositionResult<f64> {
        if let Some(gas) = self.is_pure() {
            return table.require(gas);
        }
        let mut total = 0.0;
        let mut inverse = 0.0;
        for (gas, x) in self.iter() {
            if x <= 0.0 {
                continue;
            }
            total += x;
            inverse += x / table.require(gas)?;
        }
        if inverse <= 0.0 {
            return Err(CompositionError::InvalidWeights {
                what: "composition has no positive fractions",
            });
        }
        Ok(total / inverse)
    }

    /// Back to raw form with every amount explicit.
    pub fn to_raw(&self) -> RawComposition {
        RawComposition::from_entries(
            self.items
                .iter()
                .map(|(g, x)| (g.clone(), Amount::Fraction(*x)))
                .collect(),
        )
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (gas, x)) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{gas}={x:.6}")?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const GASES: [&str; 5] = ["O2", "N2", "H2", "Ar", "CO2"];

    proptest! {
        #[test]
        fn wildcard_resolution_sums_to_one(fracs in prop::collection::vec(0.0_f64..0.2, 1..5)) {
            let mut raw = RawComposition::new();
            for (i, f) in fracs.iter().enumerate() {
                raw = raw.fraction(GASES[i], *f);
            }
            let sum: f64 = fracs.iter().sum();
            let comp = resolve(&raw.balance("He")).unwrap();

            prop_assert!((comp.fraction("He") - (1.0 - sum)).abs() < 1e-12);
            let total: f64 = comp.iter().map(|(_, x)| x).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            prop_assert!(comp.iter().all(|(_, x)| (0.0..=1.0).contains(&x)));
        }

        #[test]
        fn normalized_explicit_sets_are_unchanged(weights in prop::collection::vec(0.01_f64..1.0, 1..5)) {
            let total: f64 = weights.iter().sum();
            let fracs: Vec<(&str, f64)> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| (GASES[i], w / total))
                .collect();
            let resolved = Composition::from_fractions(fracs.clone());
            prop_assert!(resolved.is_ok(), "{:?}", resolved);
            let comp = resolved.unwrap();
            for (gas, x) in fracs {
                prop_assert_eq!(comp.fraction(gas), x);
            }
        }
    }
}
