//! SI quantity types for flows, temperatures and voltages.

use uom::si::f64::{
    ElectricPotential as UomElectricPotential,
    ThermodynamicTemperature as UomThermodynamicTemperature, VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64)
pub type FlowRate = UomVolumeRate;
pub type Temperature = UomThermodynamicTemperature;
pub type Voltage = UomElectricPotential;

#[inline]
pub fn lpm(v: f64) -> FlowRate {
    use uom::si::volume_rate::liter_per_minute;
    FlowRate::new::<liter_per_minute>(v)
}

#[inline]
pub fn mlpm(v: f64) -> FlowRate {
    lpm(v * 1e-3)
}

#[inline]
pub fn m3ps(v: f64) -> FlowRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    FlowRate::new::<cubic_meter_per_second>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn volts(v: f64) -> Voltage {
    use uom::si::electric_potential::volt;
    Voltage::new::<volt>(v)
}

/// Flow expressed in L/min.
#[inline]
pub fn as_lpm(q: FlowRate) -> f64 {
    use uom::si::volume_rate::liter_per_minute;
    q.get::<liter_per_minute>()
}

/// Flow expressed in mL/min.
#[inline]
pub fn as_mlpm(q: FlowRate) -> f64 {
    as_lpm(q) * 1e3
}

#[inline]
pub fn as_kelvin(t: Temperature) -> f64 {
    use uom::si::thermodynamic_temperature::kelvin;
    t.get::<kelvin>()
}

#[inline]
pub fn as_volts(v: Voltage) -> f64 {
    use uom::si::electric_potential::volt;
    v.get::<volt>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_smoke() {
        let _q = lpm(1.5);
        let _t = k(273.15);
        let _u = volts(5.0);
    }

    #[test]
    fn milliliter_and_liter_agree() {
        let a = mlpm(1500.0);
        let b = lpm(1.5);
        assert!((as_lpm(a) - as_lpm(b)).abs() < 1e-12);
        assert!((as_mlpm(b) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn liter_per_minute_in_si() {
        // 60 L/min = 1 L/s = 1e-3 m^3/s
        assert!((lpm(60.0).value - 1e-3).abs() < 1e-15);
        assert!((as_lpm(m3ps(1e-3)) - 60.0).abs() < 1e-9);
    }
}
