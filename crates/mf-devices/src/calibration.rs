//! Dated calibrations and setpoint/flow conversion.

use crate::error::{CalibrationError, CalibrationResult};
use crate::method::{Curve, MethodParams, MethodRegistry};
use chrono::NaiveDate;
use mf_core::ControllerId;
use mf_core::numeric::FRACTION_EPS;
use mf_core::units::{FlowRate, Temperature, as_kelvin};
use mf_gas::{Composition, ConversionFactors};
use std::fmt;

/// Allowed setpoint interval, `[0, 1]` unless overrange is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetpointRange {
    pub min: f64,
    pub max: f64,
}

impl SetpointRange {
    pub const FULL: Self = Self { min: 0.0, max: 1.0 };

    /// `[0, 1 + overrange]`
    pub fn with_overrange(overrange: f64) -> CalibrationResult<Self> {
        if !(overrange >= 0.0 && overrange.is_finite()) {
            return Err(CalibrationError::InvalidRange {
                what: "overrange must be finite and non-negative",
            });
        }
        Ok(Self {
            min: 0.0,
            max: 1.0 + overrange,
        })
    }

    pub fn overrange(&self) -> f64 {
        self.max - 1.0
    }

    /// Bounds are matched within rounding slack.
    pub fn contains(&self, setpoint: f64) -> bool {
        self.check(setpoint).is_ok()
    }

    /// Setpoints within rounding slack of a bound are snapped onto it; anything
    /// further out is an error, never clamped.
    fn check(&self, setpoint: f64) -> CalibrationResult<f64> {
        let slack = |bound: f64| FRACTION_EPS * bound.abs().max(1.0);
        let out_of_range = || CalibrationError::SetpointOutOfRange {
            setpoint,
            min: self.min,
            max: self.max,
        };
        if !setpoint.is_finite() {
            return Err(out_of_range());
        }
        if setpoint < self.min {
            return if self.min - setpoint <= slack(self.min) {
                Ok(self.min)
            } else {
                Err(out_of_range())
            };
        }
        if setpoint > self.max {
            return if setpoint - self.max <= slack(self.max) {
                Ok(self.max)
            } else {
                Err(out_of_range())
            };
        }
        Ok(setpoint)
    }
}

impl Default for SetpointRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Operating conditions that differ from the calibration reference.
///
/// `None` fields mean "same as calibrated".
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditions<'a> {
    pub gas: Option<&'a Composition>,
    pub temperature: Option<Temperature>,
}

impl<'a> Conditions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gas(mut self, gas: &'a Composition) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_temperature(mut self, temperature: Temperature) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// One dated calibration of a controller.
#[derive(Debug, Clone)]
pub struct Calibration {
    date: NaiveDate,
    gas: Composition,
    temperature: Temperature,
    curve: Curve,
    range: SetpointRange,
    controller: Option<ControllerId>,
}

impl Calibration {
    pub fn new(
        date: NaiveDate,
        gas: Composition,
        temperature: Temperature,
        curve: Curve,
    ) -> CalibrationResult<Self> {
        check_temperature(temperature)?;
        curve.validate()?;
        Ok(Self {
            date,
            gas,
            temperature,
            curve,
            range: SetpointRange::FULL,
            controller: None,
        })
    }

    /// Build the curve through `registry` from a method tag and parameters.
    pub fn from_method(
        date: NaiveDate,
        gas: Composition,
        temperature: Temperature,
        registry: &MethodRegistry,
        method: &str,
        params: &MethodParams,
    ) -> CalibrationResult<Self> {
        let curve = registry.build(method, params)?;
        Self::new(date, gas, temperature, curve)
    }

    pub fn with_range(mut self, range: SetpointRange) -> Self {
        self.range = range;
        self
    }

    pub(crate) fn set_controller(&mut self, id: ControllerId) {
        self.controller = Some(id);
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Reference gas the device was calibrated with.
    pub fn gas(&self) -> &Composition {
        &self.gas
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn method(&self) -> &str {
        self.curve.method()
    }

    pub fn params(&self) -> MethodParams {
        self.curve.params()
    }

    pub fn range(&self) -> SetpointRange {
        self.range
    }

    /// Controller this calibration was registered with.
    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    /// Flow produced by `setpoint` under reference conditions.
    pub fn indicated_to_actual(&self, setpoint: f64) -> CalibrationResult<FlowRate> {
        let setpoint = self.range.check(setpoint)?;
        Ok(self.curve.forward(setpoint))
    }

    /// Setpoint needed for `flow` under reference conditions.
    pub fn actual_to_indicated(&self, flow: FlowRate) -> CalibrationResult<f64> {
        let setpoint = self.curve.inverse(flow)?;
        self.range.check(setpoint)
    }

    /// Like [`indicated_to_actual`](Self::indicated_to_actual) with gas and
    /// temperature correction.
    pub fn indicated_to_actual_at(
        &self,
        setpoint: f64,
        conditions: &Conditions<'_>,
        factors: &ConversionFactors,
    ) -> CalibrationResult<FlowRate> {
        let flow = self.indicated_to_actual(setpoint)?;
        Ok(flow * self.correction(conditions, factors)?)
    }

    /// Like [`actual_to_indicated`](Self::actual_to_indicated) with gas and
    /// temperature correction.
    pub fn actual_to_indicated_at(
        &self,
        flow: FlowRate,
        conditions: &Conditions<'_>,
        factors: &ConversionFactors,
    ) -> CalibrationResult<f64> {
        let scale = self.correction(conditions, factors)?;
        self.actual_to_indicated(flow / scale)
    }

    /// Actual flow per calibrated flow: `CF(gas)/CF(ref) * T/T_ref`.
    pub fn correction(
        &self,
        conditions: &Conditions<'_>,
        factors: &ConversionFactors,
    ) -> CalibrationResult<f64> {
        let mut scale = 1.0;
        if let Some(gas) = conditions.gas {
            if gas != &self.gas {
                scale *= gas.conversion_factor(factors)? / self.gas.conversion_factor(factors)?;
            }
        }
        if let Some(t) = conditions.temperature {
            check_temperature(t)?;
            scale *= as_kelvin(t) / as_kelvin(self.temperature);
        }
        Ok(scale)
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {:.2} K)",
            self.date,
            self.curve.method(),
            self.gas,
            as_kelvin(self.temperature)
        )
    }
}

fn check_temperature(t: Temperature) -> CalibrationResult<()> {
    let kelvin = as_kelvin(t);
    if kelvin > 0.0 && kelvin.is_finite() {
        Ok(())
    } else {
        Err(CalibrationError::InvalidTemperature { kelvin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Linear;
    use mf_core::units::{as_lpm, k, lpm, mlpm};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn n2_calibration(offset: FlowRate, slope: FlowRate) -> Calibration {
        Calibration::new(
            date(2024, 6, 20),
            Composition::pure("N2"),
            k(300.0),
            Arc::new(Linear::new(offset, slope)),
        )
        .unwrap()
    }

    #[test]
    fn brooks01_half_scale() {
        let cal = n2_calibration(mlpm(0.0), lpm(2.0));
        let s = cal.actual_to_indicated(lpm(1.0)).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
        let flow = cal.indicated_to_actual(0.5).unwrap();
        assert!((as_lpm(flow) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn setpoint_range_enforced_both_ways() {
        let cal = n2_calibration(mlpm(0.0), lpm(2.0));
        assert!(matches!(
            cal.indicated_to_actual(1.2),
            Err(CalibrationError::SetpointOutOfRange { .. })
        ));
        assert!(matches!(
            cal.indicated_to_actual(-0.1),
            Err(CalibrationError::SetpointOutOfRange { .. })
        ));
        // 2.2 L/min would need setpoint 1.1
        assert!(matches!(
            cal.actual_to_indicated(lpm(2.2)),
            Err(CalibrationError::SetpointOutOfRange { .. })
        ));
    }

    #[test]
    fn overrange_extends_upper_bound() {
        let range = SetpointRange::with_overrange(0.1).unwrap();
        let cal = n2_calibration(mlpm(0.0), lpm(2.0)).with_range(range);
        let s = cal.actual_to_indicated(lpm(2.2)).unwrap();
        assert!((s - 1.1).abs() < 1e-12);
        assert!(cal.indicated_to_actual(1.15).is_err());
        assert!(SetpointRange::with_overrange(-0.1).is_err());
    }

    #[test]
    fn full_scale_round_trips_with_offset() {
        let cal = n2_calibration(lpm(0.01), lpm(2.0));
        let flow = cal.indicated_to_actual(1.0).unwrap();
        let back = cal.actual_to_indicated(flow).unwrap();
        assert!(back <= 1.0 && (back - 1.0).abs() < 1e-12);
        assert!(cal.range().contains(1.0 + 1e-12));
        assert!(!cal.range().contains(1.0 + 1e-6));
    }

    #[test]
    fn overrange_bound_round_trips() {
        let range = SetpointRange::with_overrange(0.1).unwrap();
        let cal = n2_calibration(lpm(0.01), lpm(2.0)).with_range(range);
        let flow = cal.indicated_to_actual(1.1).unwrap();
        let back = cal.actual_to_indicated(flow).unwrap();
        assert!(back <= range.max && (back - range.max).abs() < 1e-12);
        assert!(cal.actual_to_indicated(flow + lpm(1e-3)).is_err());
    }

    #[test]
    fn offset_shifts_zero() {
        let cal = n2_calibration(mlpm(20.0), lpm(2.0));
        // flow below the offset needs a negative setpoint
        assert!(cal.actual_to_indicated(mlpm(10.0)).is_err());
        assert_eq!(cal.actual_to_indicated(mlpm(20.0)).unwrap(), 0.0);
    }

    #[test]
    fn gas_correction_factor() {
        let cal = n2_calibration(mlpm(0.0), lpm(2.0));
        let factors = ConversionFactors::standard();
        let co2 = Composition::pure("CO2");
        let cond = Conditions::new().with_gas(&co2);

        let flow = cal.indicated_to_actual_at(0.5, &cond, &factors).unwrap();
        assert!((as_lpm(flow) - 0.74).abs() < 1e-12);

        let s = cal.actual_to_indicated_at(lpm(0.74), &cond, &factors).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
    }

    #[test]
    fn temperature_correction() {
        let cal = n2_calibration(mlpm(0.0), lpm(2.0));
        let factors = ConversionFactors::standard();
        let cond = Conditions::new().with_temperature(k(450.0));
        let flow = cal.indicated_to_actual_at(0.5, &cond, &factors).unwrap();
        assert!((as_lpm(flow) - 1.5).abs() < 1e-12);

        let frozen = Conditions::new().with_temperature(k(0.0));
        assert!(matches!(
            cal.indicated_to_actual_at(0.5, &frozen, &factors),
            Err(CalibrationError::InvalidTemperature { .. })
        ));
    }

    #[test]
    fn same_gas_skips_factor_lookup() {
        let cal = Calibration::new(
            date(2024, 1, 1),
            Composition::pure("Unobtainium"),
            k(300.0),
            Arc::new(Linear::new(mlpm(0.0), lpm(1.0))),
        )
        .unwrap();
        let factors = ConversionFactors::empty();
        let gas = Composition::pure("Unobtainium");
        let cond = Conditions::new().with_gas(&gas);
        assert_eq!(cal.correction(&cond, &factors).unwrap(), 1.0);

        let other = Composition::pure("N2");
        let cond = Conditions::new().with_gas(&other);
        assert!(matches!(
            cal.correction(&cond, &factors),
            Err(CalibrationError::Gas(_))
        ));
    }

    #[test]
    fn rejects_non_positive_reference_temperature() {
        let result = Calibration::new(
            date(2024, 1, 1),
            Composition::pure("N2"),
            k(-1.0),
            Arc::new(Linear::new(mlpm(0.0), lpm(1.0))),
        );
        assert!(matches!(
            result,
            Err(CalibrationError::InvalidTemperature { .. })
        ));
    }

    #[test]
    fn from_method_uses_registry() {
        let params = MethodParams::new()
            .with("offset", mlpm(0.0))
            .with("slope", lpm(2.0));
        let cal = Calibration::from_method(
            date(2024, 6, 20),
            Composition::pure("N2"),
            k(273.15),
            &MethodRegistry::standard(),
            "linear",
            &params,
        )
        .unwrap();
        assert_eq!(cal.method(), "linear");
        assert!(cal.controller().is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::method::Linear;
    use mf_core::units::{k, lpm};
    use proptest::prelude::*;
    use std::sync::Arc;

    proptest! {
        #[test]
        fn indicated_round_trip(
            offset in -0.1_f64..0.1,
            slope in 0.1_f64..10.0,
            setpoint in 0.0_f64..=1.0,
        ) {
            let cal = Calibration::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                Composition::pure("N2"),
                k(293.15),
                Arc::new(Linear::new(lpm(offset), lpm(slope))),
            )
            .unwrap();

            let flow = cal.indicated_to_actual(setpoint).unwrap();
            let back = cal.actual_to_indicated(flow).unwrap();
            prop_assert!((back - setpoint).abs() < 1e-9);
        }

        #[test]
        fn overrange_round_trip(
            offset in -0.1_f64..0.1,
            slope in 0.1_f64..10.0,
            overrange in 0.0_f64..0.5,
            fraction in 0.0_f64..=1.0,
        ) {
            let range = SetpointRange::with_overrange(overrange).unwrap();
            let cal = Calibration::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                Composition::pure("N2"),
                k(293.15),
                Arc::new(Linear::new(lpm(offset), lpm(slope))),
            )
            .unwrap()
            .with_range(range);

            let setpoint = fraction * range.max;
            let flow = cal.indicated_to_actual(setpoint).unwrap();
            let back = cal.actual_to_indicated(flow).unwrap();
            prop_assert!((back - setpoint).abs() < 1e-9);
            prop_assert!(back <= range.max);
        }
    }
}
