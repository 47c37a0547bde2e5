//! Mixture resolution: per-line flows and setpoints for a target gas mixture.
//!
//! The target and every line gas become a linear system in the line weights,
//! solved with an SVD pseudo-inverse (nalgebra). Weights turn into flows and
//! each bound line's calibration turns its flow into a device setpoint.

pub mod error;
pub mod lstsq;
pub mod mixture;
pub mod resolve;

pub use error::{MixtureError, MixtureResult};
pub use lstsq::LeastSquares;
pub use mixture::{LineAllocation, MixtureRequest, ResolutionResult, ResolverConfig};
pub use resolve::{balance_target, balance_target_with, resolve_mixture, resolve_mixture_with};
