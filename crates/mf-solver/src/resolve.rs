//! Distribute a target mixture across gas lines.
//!
//! Unknowns are the line weights `w` (fraction of total flow per line). Each
//! gas contributes one row `Σ_j x_gj w_j = x_g(target)` and one extra row
//! enforces `Σ w = 1`. The system is solved with the SVD pseudo-inverse, so
//! interchangeable lines share flow evenly (minimum norm).

use crate::error::{MixtureError, MixtureResult};
use crate::lstsq;
use crate::mixture::{LineAllocation, MixtureRequest, ResolutionResult, ResolverConfig};
use mf_core::units::as_lpm;
use mf_devices::{Conditions, Line};
use mf_gas::{Amount, Composition, Gas, RawComposition};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

/// Resolve with default tolerances and conversion factors.
pub fn resolve_mixture(
    request: &MixtureRequest,
    lines: &[Line],
) -> MixtureResult<ResolutionResult> {
    resolve_mixture_with(request, lines, &ResolverConfig::default())
}

pub fn resolve_mixture_with(
    request: &MixtureRequest,
    lines: &[Line],
    config: &ResolverConfig,
) -> MixtureResult<ResolutionResult> {
    config.validate()?;
    if lines.is_empty() {
        return Err(MixtureError::NoLines);
    }
    let total = as_lpm(request.total_flow);
    if !(total.is_finite() && total >= 0.0) {
        return Err(MixtureError::InvalidRequest {
            what: "total flow must be finite and non-negative",
        });
    }
    let target = &request.target;
    ensure_deliverable(target.gases(), lines)?;

    let gases = gas_rows(target.gases(), lines);
    let a = system_matrix(&gases, lines, true);
    let b = DVector::from_iterator(
        gases.len() + 1,
        gases.iter().map(|g| target.fraction(g)).chain([1.0]),
    );

    let sol = lstsq::solve(&a, &b, config.svd_rel_tol)?;
    debug!(
        rows = a.nrows(),
        lines = lines.len(),
        rank = sol.rank,
        residual = sol.residual,
        "mixture system solved"
    );
    let weights = clip_weights(sol.x.as_slice(), config.weight_eps)?;

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > config.fraction_eps {
        return Err(MixtureError::Unachievable {
            what: format!("line weights sum to {sum}"),
        });
    }

    let achieved =
        Composition::compose(lines.iter().map(|l| l.gas()).zip(weights.iter().copied()))?;
    let residual = achieved.max_deviation(target);
    if residual > config.fraction_eps {
        return Err(MixtureError::Unachievable {
            what: format!("achieved composition deviates by {residual:.3e}"),
        });
    }

    let allocations = lines
        .iter()
        .zip(&weights)
        .map(|(line, &weight)| allocate(line, weight, request, config))
        .collect::<MixtureResult<Vec<_>>>()?;

    info!(mixture = %target, flow_lpm = total, residual, "mixture resolved");
    Ok(ResolutionResult {
        allocations,
        achieved,
        residual,
    })
}

/// Turn a target with a balance gas into a concrete composition the lines
/// can deliver.
///
/// The explicit fractions are matched first; the side products of the lines
/// needed for them (e.g. the He carrier of an NH3-in-He line) are kept, and
/// the balance gas takes what remains. Targets without a balance gas resolve
/// normally.
pub fn balance_target(raw: &RawComposition, lines: &[Line]) -> MixtureResult<Composition> {
    balance_target_with(raw, lines, &ResolverConfig::default())
}

pub fn balance_target_with(
    raw: &RawComposition,
    lines: &[Line],
    config: &ResolverConfig,
) -> MixtureResult<Composition> {
    config.validate()?;
    let Some(balance) = raw.balance_gas()?.cloned() else {
        return Ok(raw.resolve()?);
    };
    if lines.is_empty() {
        return Err(MixtureError::NoLines);
    }
    // validates names, duplicates and the explicit sum
    raw.resolve()?;

    let explicit: Vec<(&Gas, f64)> = raw.explicit().collect();
    ensure_deliverable(explicit.iter().map(|(g, _)| *g), lines)?;

    let weights = if explicit.is_empty() {
        vec![0.0; lines.len()]
    } else {
        let rows: Vec<Gas> = explicit.iter().map(|(g, _)| (*g).clone()).collect();
        let a = system_matrix(&rows, lines, false);
        let b = DVector::from_iterator(explicit.len(), explicit.iter().map(|(_, x)| *x));
        let sol = lstsq::solve(&a, &b, config.svd_rel_tol)?;
        debug!(rank = sol.rank, residual = sol.residual, "explicit gases solved");
        clip_weights(sol.x.as_slice(), config.weight_eps)?
    };

    let mut balanced = RawComposition::new();
    for gas in gas_rows(raw.entries().iter().map(|(g, _)| g), lines) {
        if gas == balance {
            balanced.push(gas, Amount::Balance);
            continue;
        }
        let x: f64 = lines
            .iter()
            .zip(&weights)
            .map(|(line, w)| w * line.gas().fraction(&gas))
            .sum();
        balanced.push(gas, Amount::Fraction(x));
    }
    debug!(mixture = %balanced, "balance gas assigned");
    Ok(balanced.resolve()?)
}

fn ensure_deliverable<'a>(
    mut gases: impl Iterator<Item = &'a Gas>,
    lines: &[Line],
) -> MixtureResult<()> {
    match gases.find(|g| !lines.iter().any(|l| l.gas().contains(g))) {
        Some(gas) => Err(MixtureError::UndeliverableGas {
            gas: gas.to_string(),
        }),
        None => Ok(()),
    }
}

/// Ordered union of `first` and every line gas.
fn gas_rows<'a>(first: impl Iterator<Item = &'a Gas>, lines: &'a [Line]) -> Vec<Gas> {
    let mut rows: Vec<Gas> = Vec::new();
    for gas in first.chain(lines.iter().flat_map(|l| l.gas().gases())) {
        if !rows.contains(gas) {
            rows.push(gas.clone());
        }
    }
    rows
}

/// Gas rows by line columns, plus a row of ones when `total_row`.
fn system_matrix(gases: &[Gas], lines: &[Line], total_row: bool) -> DMatrix<f64> {
    let nrows = gases.len() + usize::from(total_row);
    DMatrix::from_fn(nrows, lines.len(), |i, j| match gases.get(i) {
        Some(gas) => lines[j].gas().fraction(gas),
        None => 1.0,
    })
}

fn clip_weights(raw: &[f64], eps: f64) -> MixtureResult<Vec<f64>> {
    raw.iter()
        .map(|&w| {
            if w < -eps {
                Err(MixtureError::Unachievable {
                    what: format!("a line would need a negative flow (weight {w:.3e})"),
                })
            } else {
                Ok(w.max(0.0))
            }
        })
        .collect()
}

fn allocate(
    line: &Line,
    weight: f64,
    request: &MixtureRequest,
    config: &ResolverConfig,
) -> MixtureResult<LineAllocation> {
    let flow = request.total_flow * weight;
    let setpoint = match line.calibration() {
        Some(cal) => {
            let conditions = Conditions {
                gas: Some(line.gas()),
                temperature: request.temperature,
            };
            let setpoint = cal
                .actual_to_indicated_at(flow, &conditions, &config.factors)
                .map_err(|source| MixtureError::LineCalibration {
                    line: line.name().to_string(),
                    source,
                })?;
            Some(setpoint)
        }
        None => None,
    };
    Ok(LineAllocation {
        line: line.name().to_string(),
        controller: line.controller_name().map(str::to_string),
        weight,
        flow,
        setpoint,
    })
}
