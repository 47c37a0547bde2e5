//! Composition sweep generation.
//!
//! A sweep varies the fraction of one or more gases over a base composition
//! (usually with a balance gas absorbing the change) and yields one resolved
//! composition per point. Used for batch experiment scripting.

use crate::composition::{Amount, Composition, RawComposition};
use crate::error::{CompositionError, CompositionResult};
use crate::gas::Gas;
use std::fmt;

/// Relative slack when deciding whether a range step lands on `stop`.
const RANGE_EPS: f64 = 1e-9;

/// Upper bound on the number of points in one sweep.
pub const MAX_SWEEP_POINTS: usize = 1_000_000;

/// Spacing of generated points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spacing {
    /// Uniformly spaced points
    Linear,
    /// Logarithmically spaced points
    Logarithmic,
}

/// Points in `start..=stop` by `step`, or `None` past [`MAX_SWEEP_POINTS`].
fn range_count(start: f64, stop: f64, step: f64) -> Option<usize> {
    let span = (stop - start) / step;
    let steps = (span + RANGE_EPS * span.abs().max(1.0)).floor();
    if !(steps >= 0.0 && steps < MAX_SWEEP_POINTS as f64) {
        return None;
    }
    (steps as usize).checked_add(1)
}

/// Values one swept gas takes.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepValues {
    /// `start, start + step, ...` up to and including `stop`.
    Range { start: f64, stop: f64, step: f64 },
    /// `count` points between `start` and `stop` inclusive.
    Points {
        start: f64,
        stop: f64,
        count: usize,
        spacing: Spacing,
    },
    /// Explicit values, emitted in the given order.
    List(Vec<f64>),
}

impl SweepValues {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Range { start, stop, step } => {
                if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
                    return Err("range bounds must be finite".to_string());
                }
                if *step <= 0.0 {
                    return Err(format!("step must be positive, got {step}"));
                }
                if stop < start {
                    return Err(format!("stop ({stop}) is below start ({start})"));
                }
                if range_count(*start, *stop, *step).is_none() {
                    return Err(format!(
                        "step {step} gives more than {MAX_SWEEP_POINTS} points"
                    ));
                }
            }
            Self::Points {
                start,
                stop,
                count,
                spacing,
            } => {
                if !(start.is_finite() && stop.is_finite()) {
                    return Err("sweep bounds must be finite".to_string());
                }
                if *count < 2 {
                    return Err("sweep must have at least 2 points".to_string());
                }
                if *count > MAX_SWEEP_POINTS {
                    return Err(format!("more than {MAX_SWEEP_POINTS} points"));
                }
                if (start - stop).abs() < 1e-12 {
                    return Err("start and end values must be different".to_string());
                }
                if *spacing == Spacing::Logarithmic && (*start <= 0.0 || *stop <= 0.0) {
                    return Err("logarithmic sweep needs positive bounds".to_string());
                }
            }
            Self::List(values) => {
                if values.is_empty() {
                    return Err("value list is empty".to_string());
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err("value list contains non-finite entries".to_string());
                }
            }
        }
        Ok(())
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        match self {
            Self::Range { start, stop, step } => range_count(*start, *stop, *step).unwrap_or(0),
            Self::Points { count, .. } => *count,
            Self::List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of point `i`, computed without accumulating step error.
    pub fn value(&self, i: usize) -> f64 {
        match self {
            Self::Range { start, stop, step } => {
                let v = start + i as f64 * step;
                if (v - stop).abs() <= RANGE_EPS * stop.abs().max(1.0) {
                    *stop
                } else {
                    v
                }
            }
            Self::Points {
                start,
                stop,
                count,
                spacing,
            } => {
                if i + 1 >= *count {
                    return *stop;
                }
                let t = i as f64 / (*count - 1) as f64;
                match spacing {
                    Spacing::Linear => start + t * (stop - start),
                    Spacing::Logarithmic => (start.ln() + t * (stop.ln() - start.ln())).exp(),
                }
            }
            Self::List(values) => values[i],
        }
    }

    /// All points, in order.
    pub fn points(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }
}

/// One swept gas.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepAxis {
    pub gas: Gas,
    pub values: SweepValues,
}

impl SweepAxis {
    pub fn new(gas: impl Into<Gas>, values: SweepValues) -> Self {
        Self {
            gas: gas.into(),
            values,
        }
    }
}

/// Full sweep: a base composition plus one or more axes.
///
/// Several axes form a cartesian product with the first axis outermost.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    base: RawComposition,
    axes: Vec<SweepAxis>,
}

impl SweepSpec {
    pub fn new(base: RawComposition, axes: Vec<SweepAxis>) -> CompositionResult<Self> {
        let invalid = |what: String| CompositionError::InvalidSweep { what };

        if axes.is_empty() {
            return Err(invalid("no swept gases".to_string()));
        }
        for (i, axis) in axes.iter().enumerate() {
            axis.gas
                .validate()
                .map_err(|_| invalid(format!("cannot sweep '{}'", axis.gas)))?;
            if axes[..i].iter().any(|a| a.gas == axis.gas) {
                return Err(invalid(format!("gas '{}' swept twice", axis.gas)));
            }
            axis.values
                .validate()
                .map_err(|e| invalid(format!("{}: {e}", axis.gas)))?;
        }
        let total = axes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.values.len()))
            .filter(|&n| n <= MAX_SWEEP_POINTS);
        if total.is_none() {
            return Err(invalid(format!(
                "axes multiply to more than {MAX_SWEEP_POINTS} points"
            )));
        }
        Ok(Self { base, axes })
    }

    /// Sweep a single gas.
    pub fn single(
        base: RawComposition,
        gas: impl Into<Gas>,
        values: SweepValues,
    ) -> CompositionResult<Self> {
        Self::new(base, vec![SweepAxis::new(gas, values)])
    }

    pub fn base(&self) -> &RawComposition {
        &self.base
    }

    pub fn axes(&self) -> &[SweepAxis] {
        &self.axes
    }

    /// Total number of points.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw composition at flat index `index`.
    fn point(&self, mut index: usize) -> RawComposition {
        let mut raw = self.base.clone();
        let mut settings = Vec::with_capacity(self.axes.len());
        for axis in self.axes.iter().rev() {
            let n = axis.values.len();
            settings.push((&axis.gas, axis.values.value(index % n)));
            index /= n;
        }
        for (gas, value) in settings.into_iter().rev() {
            raw.set(gas, Amount::Fraction(value));
        }
        raw
    }
}

impl fmt::Display for SweepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sweep over [{}]", self.base)?;
        for axis in &self.axes {
            write!(f, ", {} ({} points)", axis.gas, axis.values.len())?;
        }
        Ok(())
    }
}

/// Lazily generate the compositions of a sweep.
///
/// The iterator only borrows the spec, so calling `generate` again yields the
/// identical sequence. Infeasible points are yielded as `Err` and the
/// sequence continues.
pub fn generate(spec: &SweepSpec) -> MixtureIter<'_> {
    MixtureIter {
        spec,
        next: 0,
        len: spec.len(),
    }
}

/// Iterator returned by [`generate`].
#[derive(Debug, Clone)]
pub struct MixtureIter<'a> {
    spec: &'a SweepSpec,
    next: usize,
    len: usize,
}

impl Iterator for MixtureIter<'_> {
    type Item = CompositionResult<Composition>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let raw = self.spec.point(self.next);
        self.next += 1;
        Some(raw.resolve())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.next;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for MixtureIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn nh3_in_he() -> RawComposition {
        RawComposition::new().fraction("NH3", 0.0).balance("He")
    }

    #[test]
    fn range_sweep_with_wildcard() {
        let spec = SweepSpec::single(
            nh3_in_he(),
            "NH3",
            SweepValues::Range {
                start: 0.0,
                stop: 0.1,
                step: 0.05,
            },
        )
        .unwrap();

        let comps: Vec<Composition> = generate(&spec).map(|c| c.unwrap()).collect();
        assert_eq!(comps.len(), 3);
        let nh3: Vec<f64> = comps.iter().map(|c| c.fraction("NH3")).collect();
        assert_eq!(nh3, [0.0, 0.05, 0.1]);
        assert!((comps[2].fraction("He") - 0.9).abs() < 1e-12);
    }

    #[test]
    fn generate_is_restartable() {
        let spec = SweepSpec::single(
            nh3_in_he(),
            "NH3",
            SweepValues::Range {
                start: 0.0,
                stop: 0.1,
                step: 0.05,
            },
        )
        .unwrap();
        let first: Vec<_> = generate(&spec).collect();
        let second: Vec<_> = generate(&spec).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn infeasible_points_are_errors_not_gaps() {
        let base = RawComposition::new()
            .fraction("O2", 0.0)
            .fraction("N2", 0.5)
            .balance("He");
        let spec = SweepSpec::single(base, "O2", SweepValues::List(vec![0.2, 0.7, 0.4])).unwrap();

        let results: Vec<_> = generate(&spec).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CompositionError::ExceedsUnity { .. })
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn swept_gas_is_appended_when_missing_from_base() {
        let base = RawComposition::new().balance("N2");
        let spec = SweepSpec::single(base, "CO2", SweepValues::List(vec![0.04])).unwrap();
        let comp = generate(&spec).next().unwrap().unwrap();
        let gases: Vec<&str> = comp.gases().map(|g| g.as_str()).collect();
        assert_eq!(gases, ["N2", "CO2"]);
        assert!((comp.fraction("N2") - 0.96).abs() < 1e-12);
    }

    #[test]
    fn two_axes_form_product_first_outermost() {
        let base = RawComposition::new()
            .fraction("O2", 0.0)
            .fraction("CO2", 0.0)
            .balance("N2");
        let spec = SweepSpec::new(
            base,
            vec![
                SweepAxis::new("O2", SweepValues::List(vec![0.1, 0.2])),
                SweepAxis::new("CO2", SweepValues::List(vec![0.01, 0.02, 0.03])),
            ],
        )
        .unwrap();
        assert_eq!(spec.len(), 6);

        let pairs: Vec<(f64, f64)> = generate(&spec)
            .map(|c| c.unwrap())
            .map(|c| (c.fraction("O2"), c.fraction("CO2")))
            .collect();
        assert_eq!(
            pairs,
            [
                (0.1, 0.01),
                (0.1, 0.02),
                (0.1, 0.03),
                (0.2, 0.01),
                (0.2, 0.02),
                (0.2, 0.03)
            ]
        );
    }

    #[test]
    fn linear_and_log_points() {
        let lin = SweepValues::Points {
            start: 0.0,
            stop: 0.2,
            count: 5,
            spacing: Spacing::Linear,
        };
        let p = lin.points();
        assert_eq!(p.len(), 5);
        assert!((p[2] - 0.1).abs() < 1e-12);
        assert_eq!(p[4], 0.2);

        let log = SweepValues::Points {
            start: 1e-4,
            stop: 1e-2,
            count: 3,
            spacing: Spacing::Logarithmic,
        };
        let p = log.points();
        assert!((p[1] - 1e-3).abs() / 1e-3 < 1e-9);
        assert_eq!(p[2], 1e-2);
    }

    #[test]
    fn exact_size() {
        let spec = SweepSpec::single(
            nh3_in_he(),
            "NH3",
            SweepValues::Range {
                start: 0.0,
                stop: 0.01,
                step: 0.001,
            },
        )
        .unwrap();
        let mut it = generate(&spec);
        assert_eq!(it.len(), 11);
        it.next();
        assert_eq!(it.len(), 10);
    }

    #[test]
    fn tiny_step_rejected_instead_of_overflowing() {
        let tiny = SweepValues::Range {
            start: 0.0,
            stop: 0.1,
            step: 1e-300,
        };
        assert!(matches!(
            SweepSpec::single(nh3_in_he(), "NH3", tiny),
            Err(CompositionError::InvalidSweep { .. })
        ));

        let huge = SweepValues::Points {
            start: 0.0,
            stop: 0.1,
            count: usize::MAX,
            spacing: Spacing::Linear,
        };
        assert!(SweepSpec::single(nh3_in_he(), "NH3", huge).is_err());
    }

    #[test]
    fn axis_product_is_bounded() {
        let axis = |gas: &str| {
            SweepAxis::new(
                gas,
                SweepValues::Points {
                    start: 0.0,
                    stop: 0.01,
                    count: 1001,
                    spacing: Spacing::Linear,
                },
            )
        };
        let base = RawComposition::new().balance("He");
        let spec = SweepSpec::new(base.clone(), vec![axis("NH3"), axis("O2")]);
        assert!(matches!(spec, Err(CompositionError::InvalidSweep { .. })));

        let spec = SweepSpec::new(base, vec![axis("NH3")]).unwrap();
        assert_eq!(generate(&spec).len(), 1001);
    }

    #[test]
    fn invalid_specs_rejected() {
        let bad_step = SweepValues::Range {
            start: 0.0,
            stop: 0.1,
            step: 0.0,
        };
        assert!(SweepSpec::single(nh3_in_he(), "NH3", bad_step).is_err());

        let reversed = SweepValues::Range {
            start: 0.1,
            stop: 0.0,
            step: 0.01,
        };
        assert!(SweepSpec::single(nh3_in_he(), "NH3", reversed).is_err());

        let one_point = SweepValues::Points {
            start: 0.0,
            stop: 0.1,
            count: 1,
            spacing: Spacing::Linear,
        };
        assert!(SweepSpec::single(nh3_in_he(), "NH3", one_point).is_err());

        let wildcard = SweepValues::List(vec![0.1]);
        assert!(matches!(
            SweepSpec::single(nh3_in_he(), "*", wildcard),
            Err(CompositionError::InvalidSweep { .. })
        ));

        assert!(SweepSpec::new(nh3_in_he(), vec![]).is_err());

        let twice = vec![
            SweepAxis::new("NH3", SweepValues::List(vec![0.1])),
            SweepAxis::new("NH3", SweepValues::List(vec![0.2])),
        ];
        assert!(SweepSpec::new(nh3_in_he(), twice).is_err());
    }
}
