//! Gas lines: a composition bound to a controller calibration.

use crate::calibration::Calibration;
use crate::controller::{CalibrationSelector, ControllerSet};
use crate::error::CalibrationResult;
use mf_core::ControllerId;
use mf_gas::Composition;
use std::fmt;

/// Controller and calibration a line meters through.
#[derive(Debug, Clone)]
pub struct Binding {
    pub controller: ControllerId,
    pub controller_name: String,
    pub calibration: Calibration,
}

/// A logical gas channel.
#[derive(Debug, Clone)]
pub struct Line {
    name: String,
    gas: Composition,
    binding: Option<Binding>,
}

impl Line {
    /// A line with no controller. It receives a flow but no setpoint.
    pub fn unbound(name: impl Into<String>, gas: Composition) -> Self {
        Self {
            name: name.into(),
            gas,
            binding: None,
        }
    }

    /// Bind to the calibration `selector` picks from controller `controller`.
    pub fn bind(
        name: impl Into<String>,
        gas: Composition,
        controllers: &ControllerSet,
        controller: &str,
        selector: CalibrationSelector,
    ) -> CalibrationResult<Self> {
        let mfc = controllers.by_name(controller)?;
        let calibration = mfc.calibration(selector)?.clone();
        Ok(Self {
            name: name.into(),
            gas,
            binding: Some(Binding {
                controller: mfc.id(),
                controller_name: mfc.name().to_string(),
                calibration,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gas(&self) -> &Composition {
        &self.gas
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.binding.as_ref().map(|b| &b.calibration)
    }

    pub fn controller_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.controller_name.as_str())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.gas)?;
        if let Some(b) = &self.binding {
            write!(f, " via {} ({})", b.controller_name, b.calibration.date())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Connection, ControllerInfo};
    use crate::error::CalibrationError;
    use crate::method::Linear;
    use chrono::NaiveDate;
    use mf_core::units::{k, lpm, mlpm};
    use std::sync::Arc;

    fn setup() -> ControllerSet {
        let mut set = ControllerSet::new();
        let id = set
            .add("Brooks01", ControllerInfo::default(), Connection::None)
            .unwrap();
        for (y, slope) in [(2023, 1.0), (2024, 2.0)] {
            let cal = Calibration::new(
                NaiveDate::from_ymd_opt(y, 6, 20).unwrap(),
                Composition::pure("N2"),
                k(273.15),
                Arc::new(Linear::new(mlpm(0.0), lpm(slope))),
            )
            .unwrap();
            set.add_calibration(id, cal).unwrap();
        }
        set
    }

    #[test]
    fn bind_latest_and_as_of() {
        let set = setup();
        let latest = Line::bind(
            "nitrogen",
            Composition::pure("N2"),
            &set,
            "Brooks01",
            CalibrationSelector::Latest,
        )
        .unwrap();
        assert_eq!(latest.controller_name(), Some("Brooks01"));
        assert_eq!(
            latest.calibration().unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 6, 20).unwrap()
        );

        let older = Line::bind(
            "nitrogen",
            Composition::pure("N2"),
            &set,
            "Brooks01",
            CalibrationSelector::AsOf(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        )
        .unwrap();
        assert_eq!(
            older.calibration().unwrap().date(),
            NaiveDate::from_ymd_opt(2023, 6, 20).unwrap()
        );
    }

    #[test]
    fn unknown_controller_fails() {
        let set = setup();
        let err = Line::bind(
            "x",
            Composition::pure("N2"),
            &set,
            "Missing",
            CalibrationSelector::Latest,
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::UnknownController { .. }));
    }

    #[test]
    fn unbound_line_has_no_calibration() {
        let line = Line::unbound("vent", Composition::pure("Ar"));
        assert!(line.binding().is_none());
        assert!(line.calibration().is_none());
        assert_eq!(line.to_string(), "vent [Ar=1.000000]");
    }
}
