//! Calibration curves and the registry that builds them from method tags.

use crate::error::{CalibrationError, CalibrationResult};
use mf_core::units::{FlowRate, as_lpm};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Below this magnitude (L/min) a linear slope cannot be inverted.
pub const MIN_SLOPE_LPM: f64 = 1e-12;

/// Shared, immutable calibration curve.
pub type Curve = Arc<dyn CalibrationCurve>;

/// Builds a curve from named flow parameters.
pub type CurveBuilder = fn(&MethodParams) -> CalibrationResult<Curve>;

/// Mapping between a dimensionless setpoint and a physical flow.
///
/// Implementations are pure functions of their parameters. Range checks are
/// done by the owning [`Calibration`](crate::Calibration), not here.
pub trait CalibrationCurve: fmt::Debug + Send + Sync {
    /// Method tag this curve was built from.
    fn method(&self) -> &str;

    /// Check the parameters describe a usable curve.
    fn validate(&self) -> CalibrationResult<()>;

    /// Setpoint to flow.
    fn forward(&self, setpoint: f64) -> FlowRate;

    /// Flow to setpoint.
    fn inverse(&self, flow: FlowRate) -> CalibrationResult<f64>;

    /// Parameters in the form accepted by the builder.
    fn params(&self) -> MethodParams;
}

/// Named flow-typed parameters of a calibration method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodParams {
    values: BTreeMap<String, FlowRate>,
}

impl MethodParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: FlowRate) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FlowRate) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<FlowRate> {
        self.values.get(name).copied()
    }

    pub fn require(&self, method: &str, name: &str) -> CalibrationResult<FlowRate> {
        let value = self
            .get(name)
            .ok_or_else(|| CalibrationError::MissingParameter {
                method: method.to_string(),
                parameter: name.to_string(),
            })?;
        if !value.value.is_finite() {
            return Err(CalibrationError::InvalidParameter {
                parameter: name.to_string(),
                value: value.value,
            });
        }
        Ok(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FlowRate)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// `actual = offset + slope * setpoint`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    pub offset: FlowRate,
    pub slope: FlowRate,
}

impl Linear {
    pub const TAG: &'static str = "linear";

    pub fn new(offset: FlowRate, slope: FlowRate) -> Self {
        Self { offset, slope }
    }

    fn build(params: &MethodParams) -> CalibrationResult<Curve> {
        let curve = Self {
            offset: params.require(Self::TAG, "offset")?,
            slope: params.require(Self::TAG, "slope")?,
        };
        curve.validate()?;
        Ok(Arc::new(curve))
    }
}

impl CalibrationCurve for Linear {
    fn method(&self) -> &str {
        Self::TAG
    }

    fn validate(&self) -> CalibrationResult<()> {
        for (name, q) in [("offset", self.offset), ("slope", self.slope)] {
            if !q.value.is_finite() {
                return Err(CalibrationError::InvalidParameter {
                    parameter: name.to_string(),
                    value: q.value,
                });
            }
        }
        Ok(())
    }

    fn forward(&self, setpoint: f64) -> FlowRate {
        self.offset + self.slope * setpoint
    }

    fn inverse(&self, flow: FlowRate) -> CalibrationResult<f64> {
        let slope = as_lpm(self.slope);
        if slope.abs() < MIN_SLOPE_LPM {
            return Err(CalibrationError::NonInvertible { slope });
        }
        Ok((as_lpm(flow) - as_lpm(self.offset)) / slope)
    }

    fn params(&self) -> MethodParams {
        MethodParams::new()
            .with("offset", self.offset)
            .with("slope", self.slope)
    }
}

/// Method tag to curve builder.
///
/// New methods are added with [`register`](Self::register); nothing that
/// builds calibrations has to change.
#[derive(Clone)]
pub struct MethodRegistry {
    builders: HashMap<String, CurveBuilder>,
}

impl MethodRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with the built-in `linear` method.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Linear::TAG, Linear::build);
        registry
    }

    /// Add or replace a method.
    pub fn register(&mut self, tag: impl Into<String>, builder: CurveBuilder) {
        self.builders.insert(tag.into(), builder);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.builders.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn build(&self, tag: &str, params: &MethodParams) -> CalibrationResult<Curve> {
        let builder = self
            .builders
            .get(tag)
            .ok_or_else(|| CalibrationError::UnknownMethod {
                method: tag.to_string(),
            })?;
        builder(params)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::units::{lpm, mlpm};

    fn linear_params(offset: FlowRate, slope: FlowRate) -> MethodParams {
        MethodParams::new()
            .with("offset", offset)
            .with("slope", slope)
    }

    #[test]
    fn linear_forward_and_inverse() {
        let curve = Linear::new(mlpm(10.0), lpm(2.0));
        assert!((as_lpm(curve.forward(0.5)) - 1.01).abs() < 1e-12);
        let s = curve.inverse(lpm(1.01)).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_slope_not_invertible() {
        let curve = Linear::new(lpm(0.0), lpm(0.0));
        assert!(matches!(
            curve.inverse(lpm(1.0)),
            Err(CalibrationError::NonInvertible { .. })
        ));
    }

    #[test]
    fn registry_builds_linear() {
        let registry = MethodRegistry::standard();
        let curve = registry
            .build("linear", &linear_params(lpm(0.0), lpm(2.0)))
            .unwrap();
        assert_eq!(curve.method(), "linear");
        assert_eq!(curve.params().get("slope"), Some(lpm(2.0)));
    }

    #[test]
    fn unknown_method_and_missing_parameter() {
        let registry = MethodRegistry::standard();
        assert!(matches!(
            registry.build("polynomial", &MethodParams::new()),
            Err(CalibrationError::UnknownMethod { .. })
        ));

        let params = MethodParams::new().with("offset", lpm(0.0));
        match registry.build("linear", &params) {
            Err(CalibrationError::MissingParameter { parameter, .. }) => {
                assert_eq!(parameter, "slope")
            }
            other => panic!("expected MissingParameter, got {other:?}"),
        }
    }

    #[test]
    fn custom_methods_can_be_registered() {
        #[derive(Debug)]
        struct Fixed(FlowRate);

        impl CalibrationCurve for Fixed {
            fn method(&self) -> &str {
                "fixed"
            }
            fn validate(&self) -> CalibrationResult<()> {
                Ok(())
            }
            fn forward(&self, _setpoint: f64) -> FlowRate {
                self.0
            }
            fn inverse(&self, _flow: FlowRate) -> CalibrationResult<f64> {
                Ok(1.0)
            }
            fn params(&self) -> MethodParams {
                MethodParams::new().with("flow", self.0)
            }
        }

        fn build_fixed(params: &MethodParams) -> CalibrationResult<Curve> {
            Ok(Arc::new(Fixed(params.require("fixed", "flow")?)))
        }

        let mut registry = MethodRegistry::standard();
        registry.register("fixed", build_fixed);
        assert_eq!(registry.methods(), ["fixed", "linear"]);

        let params = MethodParams::new().with("flow", lpm(3.0));
        let curve = registry.build("fixed", &params).unwrap();
        assert_eq!(curve.forward(0.2), lpm(3.0));
    }

    #[test]
    fn non_finite_parameters_rejected() {
        let registry = MethodRegistry::standard();
        let params = linear_params(lpm(0.0), lpm(f64::NAN));
        assert!(matches!(
            registry.build("linear", &params),
            Err(CalibrationError::InvalidParameter { .. })
        ));
    }
}
