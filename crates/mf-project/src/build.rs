//! Turning a validated configuration into controllers and lines.

use crate::schema::{
    CalibrationDef, Config, ControllerDef, DeviceDef, GasDef, InfoDef, LineDef, Scalar,
};
use crate::validate::{ValidationError, parse_selector, validate_config};
use crate::{ProjectError, ProjectResult};
use mf_devices::{
    Calibration, CalibrationError, CalibrationSelector, Connection, ControllerInfo,
    ControllerSet, Line, MethodParams, MethodRegistry, SetpointRange,
};
use mf_gas::{Amount, Composition, CompositionResult, Gas, RawComposition, UnitRegistry};
use tracing::{debug, info};

/// Controllers and lines built from a configuration.
#[derive(Debug, Clone)]
pub struct Setup {
    pub controllers: ControllerSet,
    pub lines: Vec<Line>,
}

/// Which lines take part in a mixture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LineSelection {
    #[default]
    All,
    /// Lines by name, in this order.
    Named(Vec<String>),
}

impl LineSelection {
    /// Comma-separated names; blank text selects all lines.
    pub fn parse(text: &str) -> Self {
        let names: Vec<String> = text
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            Self::All
        } else {
            Self::Named(names)
        }
    }
}

impl Setup {
    pub fn line(&self, name: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.name() == name)
    }

    pub fn select_lines(&self, selection: &LineSelection) -> ProjectResult<Vec<Line>> {
        match selection {
            LineSelection::All => Ok(self.lines.clone()),
            LineSelection::Named(names) => names
                .iter()
                .map(|name| {
                    self.line(name)
                        .cloned()
                        .ok_or_else(|| ProjectError::UnknownLine { name: name.clone() })
                })
                .collect(),
        }
    }
}

impl Config {
    /// Build with the standard unit and calibration-method registries.
    pub fn build(&self) -> ProjectResult<Setup> {
        self.build_with(&UnitRegistry::standard(), &MethodRegistry::standard())
    }

    pub fn build_with(
        &self,
        units: &UnitRegistry,
        methods: &MethodRegistry,
    ) -> ProjectResult<Setup> {
        validate_config(self)?;

        let mut controllers = ControllerSet::new();
        for def in &self.controllers {
            build_controller(&mut controllers, def, units, methods)?;
        }

        let lines = self
            .lines
            .iter()
            .map(|def| build_line(&controllers, def, units))
            .collect::<ProjectResult<Vec<_>>>()?;

        info!(
            controllers = controllers.len(),
            lines = lines.len(),
            "configuration built"
        );
        Ok(Setup { controllers, lines })
    }
}

impl GasDef {
    /// Parse into an unresolved composition.
    pub fn to_raw(&self, units: &UnitRegistry) -> CompositionResult<RawComposition> {
        match self {
            Self::Text(text) => RawComposition::parse(text, units),
            Self::Map(map) => {
                let mut raw = RawComposition::new();
                for (gas, amount) in &map.0 {
                    let gas = Gas::from(gas.trim());
                    gas.validate()?;
                    let amount = match amount {
                        Scalar::Number(x) => Amount::Fraction(*x),
                        Scalar::Text(text) => Amount::parse(text, units)?,
                    };
                    raw.push(gas, amount);
                }
                Ok(raw)
            }
        }
    }

    pub fn resolve(&self, units: &UnitRegistry) -> CompositionResult<Composition> {
        self.to_raw(units)?.resolve()
    }
}

impl From<InfoDef> for ControllerInfo {
    fn from(def: InfoDef) -> Self {
        Self {
            manufacturer: def.manufacturer,
            model: def.model,
            serial_number: def.serial_number,
            specifications: def.specifications,
        }
    }
}

fn build_controller(
    controllers: &mut ControllerSet,
    def: &ControllerDef,
    units: &UnitRegistry,
    methods: &MethodRegistry,
) -> ProjectResult<()> {
    let context = |what: &str| format!("controller '{}' {what}", def.name);

    let connection = match &def.device {
        None | Some(DeviceDef::None) => Connection::None,
        Some(DeviceDef::FlowBus) => Connection::FlowBus,
        Some(DeviceDef::Analog {
            max_output_voltage,
            max_input_voltage,
        }) => {
            let parse = |v: &Scalar| {
                units
                    .parse_voltage(&v.to_string())
                    .map_err(|source| ProjectError::Unit {
                        context: context("voltage"),
                        source,
                    })
            };
            Connection::Analog {
                max_output_voltage: parse(max_output_voltage)?,
                max_input_voltage: parse(max_input_voltage)?,
            }
        }
    };

    let info = def.info.clone().map(ControllerInfo::from).unwrap_or_default();
    let id = controllers
        .add(def.name.as_str(), info, connection)
        .map_err(|source| ProjectError::Controller {
            controller: def.name.clone(),
            source,
        })?;

    for cal in &def.calibrations {
        let calibration = build_calibration(&def.name, cal, units, methods)?;
        controllers
            .add_calibration(id, calibration)
            .map_err(|source| ProjectError::Controller {
                controller: def.name.clone(),
                source,
            })?;
    }
    debug!(
        controller = %def.name,
        calibrations = def.calibrations.len(),
        connection = %connection,
        "controller built"
    );
    Ok(())
}

fn build_calibration(
    controller: &str,
    def: &CalibrationDef,
    units: &UnitRegistry,
    methods: &MethodRegistry,
) -> ProjectResult<Calibration> {
    let context =
        |what: &str| format!("controller '{controller}' calibration {} {what}", def.date);
    let calibration_error = |source: CalibrationError| ProjectError::Controller {
        controller: controller.to_string(),
        source,
    };

    let gas = def.gas.resolve(units).map_err(|source| ProjectError::Gas {
        context: context("gas"),
        source,
    })?;
    let temperature = units
        .parse_temperature(&def.temperature.to_string())
        .map_err(|source| ProjectError::Unit {
            context: context("temperature"),
            source,
        })?;

    let mut params = MethodParams::new();
    for (name, value) in &def.params {
        let flow = units
            .parse_flow(&value.to_string())
            .map_err(|source| ProjectError::Unit {
                context: context(name),
                source,
            })?;
        params.insert(name.as_str(), flow);
    }

    let mut calibration =
        Calibration::from_method(def.date, gas, temperature, methods, &def.method, &params)
            .map_err(calibration_error)?;
    if let Some(overrange) = def.overrange {
        let range = SetpointRange::with_overrange(overrange).map_err(calibration_error)?;
        calibration = calibration.with_range(range);
    }
    Ok(calibration)
}

fn build_line(
    controllers: &ControllerSet,
    def: &LineDef,
    units: &UnitRegistry,
) -> ProjectResult<Line> {
    let gas = def.gas.resolve(units).map_err(|source| ProjectError::Gas {
        context: format!("line '{}' gas", def.name),
        source,
    })?;

    let Some(device) = &def.device else {
        debug!(line = %def.name, "unbound line");
        return Ok(Line::unbound(def.name.as_str(), gas));
    };

    let selector = match parse_selector(&device.calibration) {
        Ok(None) => CalibrationSelector::Latest,
        Ok(Some(date)) => CalibrationSelector::AsOf(date),
        Err(reason) => {
            return Err(ValidationError::InvalidValue {
                field: format!("line '{}' calibration", def.name),
                value: device.calibration.clone(),
                reason,
            }
            .into());
        }
    };

    let line = Line::bind(def.name.as_str(), gas, controllers, &device.controller, selector)
        .map_err(|source| ProjectError::Line {
            line: def.name.clone(),
            source,
        })?;
    debug!(line = %def.name, controller = %device.controller, %selector, "line bound");
    Ok(line)
}
