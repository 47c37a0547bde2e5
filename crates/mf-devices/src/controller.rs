//! Mass-flow controllers and their calibration history.

use crate::calibration::Calibration;
use crate::error::{CalibrationError, CalibrationResult};
use chrono::NaiveDate;
use mf_core::ControllerId;
use mf_core::units::Voltage;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Identity of the physical device. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub specifications: Option<String>,
}

/// How the device is wired. Carried as data; nothing here drives hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Connection {
    #[default]
    None,
    Analog {
        max_output_voltage: Voltage,
        max_input_voltage: Voltage,
    },
    FlowBus,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Analog { .. } => f.write_str("Analog"),
            Self::FlowBus => f.write_str("FlowBus"),
        }
    }
}

/// Which calibration a line uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CalibrationSelector {
    #[default]
    Latest,
    /// Most recent calibration on or before the date.
    AsOf(NaiveDate),
}

impl fmt::Display for CalibrationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::AsOf(date) => write!(f, "{date}"),
        }
    }
}

/// A mass-flow controller with a date-ordered calibration history.
#[derive(Debug, Clone)]
pub struct Controller {
    id: ControllerId,
    name: String,
    pub info: ControllerInfo,
    pub connection: Connection,
    /// Sorted by date, dates unique.
    calibrations: Vec<Calibration>,
}

impl Controller {
    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calibrations(&self) -> &[Calibration] {
        &self.calibrations
    }

    /// Add a calibration, keeping date order. Dates must be unique.
    pub fn add_calibration(&mut self, mut calibration: Calibration) -> CalibrationResult<()> {
        let date = calibration.date();
        let pos = match self.calibrations.binary_search_by_key(&date, Calibration::date) {
            Ok(_) => {
                return Err(CalibrationError::DuplicateDate {
                    controller: self.name.clone(),
                    date,
                });
            }
            Err(pos) => pos,
        };
        calibration.set_controller(self.id);
        debug!(controller = %self.name, %date, "calibration added");
        self.calibrations.insert(pos, calibration);
        Ok(())
    }

    pub fn latest(&self) -> CalibrationResult<&Calibration> {
        self.calibrations
            .last()
            .ok_or_else(|| CalibrationError::NoCalibrations {
                controller: self.name.clone(),
            })
    }

    /// Calibration with the greatest date not after `date`.
    pub fn calibration_as_of(&self, date: NaiveDate) -> CalibrationResult<&Calibration> {
        if self.calibrations.is_empty() {
            return Err(CalibrationError::NoCalibrations {
                controller: self.name.clone(),
            });
        }
        let count = self.calibrations.partition_point(|c| c.date() <= date);
        count
            .checked_sub(1)
            .map(|i| &self.calibrations[i])
            .ok_or_else(|| CalibrationError::NoCalibrationBefore {
                controller: self.name.clone(),
                date,
            })
    }

    pub fn calibration(&self, selector: CalibrationSelector) -> CalibrationResult<&Calibration> {
        match selector {
            CalibrationSelector::Latest => self.latest(),
            CalibrationSelector::AsOf(date) => self.calibration_as_of(date),
        }
    }
}

/// Arena of controllers addressed by [`ControllerId`] or by name.
#[derive(Debug, Clone, Default)]
pub struct ControllerSet {
    controllers: Vec<Controller>,
    by_name: HashMap<String, ControllerId>,
}

impl ControllerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller without calibrations. Names must be unique.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        info: ControllerInfo,
        connection: Connection,
    ) -> CalibrationResult<ControllerId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(CalibrationError::DuplicateController { name });
        }
        let id = ControllerId::from_index(self.controllers.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.controllers.push(Controller {
            id,
            name,
            info,
            connection,
            calibrations: Vec::new(),
        });
        Ok(id)
    }

    pub fn get(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(id.index() as usize)
    }

    pub fn get_mut(&mut self, id: ControllerId) -> Option<&mut Controller> {
        self.controllers.get_mut(id.index() as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<ControllerId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> CalibrationResult<&Controller> {
        self.id_of(name)
            .and_then(|id| self.get(id))
            .ok_or_else(|| CalibrationError::UnknownController {
                name: name.to_string(),
            })
    }

    pub fn add_calibration(
        &mut self,
        id: ControllerId,
        calibration: Calibration,
    ) -> CalibrationResult<()> {
        let controller = self
            .controllers
            .get_mut(id.index() as usize)
            .ok_or_else(|| CalibrationError::UnknownController {
                name: id.to_string(),
            })?;
        controller.add_calibration(calibration)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Controller> + '_ {
        self.controllers.iter()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
