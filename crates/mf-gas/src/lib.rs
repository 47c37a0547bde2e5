//! mf-gas: gas compositions for mixflow.
//!
//! Provides:
//! - Gas identifiers and thermal-MFC conversion factors
//! - Raw (possibly wildcarded) and resolved compositions
//! - Unit-string parsing through an explicit `UnitRegistry`
//! - Parametric composition sweeps
//!
//! # Example
//!
//! ```
//! use mf_gas::{RawComposition, UnitRegistry, resolve};
//!
//! let units = UnitRegistry::standard();
//! let raw = RawComposition::parse("NH3=1%, He=*", &units).unwrap();
//! let comp = resolve(&raw).unwrap();
//! assert!((comp.fraction("He") - 0.99).abs() < 1e-12);
//! ```

pub mod composition;
pub mod error;
pub mod gas;
pub mod sweeps;
pub mod units;

// Re-exports for ergonomics
pub use composition::{Amount, Composition, RawComposition, resolve};
pub use error::{CompositionError, CompositionResult};
pub use gas::{ConversionFactors, Gas, WILDCARD};
pub use sweeps::{MAX_SWEEP_POINTS, MixtureIter, Spacing, SweepAxis, SweepSpec, SweepValues, generate};
pub use units::{Dimension, UnitError, UnitRegistry};
