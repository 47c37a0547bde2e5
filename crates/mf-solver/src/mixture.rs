//! Requests, results and tuning for mixture resolution.

use crate::error::MixtureResult;
use mf_core::numeric::Tolerances;
use mf_core::units::{FlowRate, Temperature, as_lpm, lpm};
use mf_gas::{Composition, ConversionFactors};
use std::fmt;

/// What to produce: a target composition at a total flow.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureRequest {
    pub target: Composition,
    pub total_flow: FlowRate,
    /// Operating temperature; calibration reference when `None`.
    pub temperature: Option<Temperature>,
}

impl MixtureRequest {
    pub fn new(target: Composition, total_flow: FlowRate) -> Self {
        Self {
            target,
            total_flow,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Temperature) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Resolver tolerances and gas data.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Negative weights down to `-weight_eps` are treated as zero.
    pub weight_eps: f64,
    /// Allowed deviation of achieved fractions and of the weight sum.
    pub fraction_eps: f64,
    /// Relative singular-value cutoff for the least-squares solve.
    pub svd_rel_tol: f64,
    /// Conversion factors for gas correction of setpoints.
    pub factors: ConversionFactors,
}

impl ResolverConfig {
    /// Tolerances must be finite and non-negative.
    pub fn validate(&self) -> MixtureResult<()> {
        // weight_eps and fraction_eps are absolute, svd_rel_tol is relative
        Tolerances::new(self.weight_eps, self.svd_rel_tol)?;
        Tolerances::new(self.fraction_eps, 0.0)?;
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            weight_eps: 1e-9,
            fraction_eps: 1e-6,
            svd_rel_tol: 1e-12,
            factors: ConversionFactors::standard(),
        }
    }
}

/// Flow assigned to one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAllocation {
    pub line: String,
    pub controller: Option<String>,
    /// Fraction of the total flow.
    pub weight: f64,
    pub flow: FlowRate,
    /// Fraction of full scale; `None` for unbound lines.
    pub setpoint: Option<f64>,
}

impl fmt::Display for LineAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.6} of total, {:.6} L/min",
            self.line,
            self.weight,
            as_lpm(self.flow)
        )?;
        match (&self.controller, self.setpoint) {
            (Some(controller), Some(setpoint)) => {
                write!(f, ", setpoint {setpoint:.6} on {controller}")
            }
            _ => f.write_str(", no controller"),
        }
    }
}

/// Outcome of [`resolve_mixture`](crate::resolve_mixture).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    /// One entry per input line, in input order.
    pub allocations: Vec<LineAllocation>,
    /// Composition recomputed from the allocated flows.
    pub achieved: Composition,
    /// Max absolute fraction deviation of `achieved` from the target.
    pub residual: f64,
}

impl ResolutionResult {
    pub fn allocation(&self, line: &str) -> Option<&LineAllocation> {
        self.allocations.iter().find(|a| a.line == line)
    }

    /// Sum of all line flows.
    pub fn total_flow(&self) -> FlowRate {
        self.allocations
            .iter()
            .map(|a| a.flow)
            .fold(lpm(0.0), |acc, f| acc + f)
    }
}
