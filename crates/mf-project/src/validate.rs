//! Structural validation of a configuration, before anything is parsed.

use crate::schema::{Config, ControllerDef};
use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

pub fn validate_config(config: &Config) -> Result<(), ValidationError> {
    if let Some(level) = config.log_level() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "logging.level".to_string(),
                value: level.to_string(),
                reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
    }

    let mut controller_names = HashSet::new();
    for controller in &config.controllers {
        check_name(&controller.name, "controllers")?;
        if !controller_names.insert(controller.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: controller.name.clone(),
                context: "controllers".to_string(),
            });
        }
        validate_controller(controller)?;
    }

    let mut line_names = HashSet::new();
    for line in &config.lines {
        check_name(&line.name, "lines")?;
        if !line_names.insert(line.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: line.name.clone(),
                context: "lines".to_string(),
            });
        }
        if let Some(device) = &line.device {
            if !controller_names.contains(device.controller.as_str()) {
                return Err(ValidationError::MissingReference {
                    name: device.controller.clone(),
                    context: format!("line '{}' controller", line.name),
                });
            }
            parse_selector(&device.calibration).map_err(|reason| {
                ValidationError::InvalidValue {
                    field: format!("line '{}' calibration", line.name),
                    value: device.calibration.clone(),
                    reason,
                }
            })?;
        }
    }

    Ok(())
}

fn validate_controller(controller: &ControllerDef) -> Result<(), ValidationError> {
    let mut dates: HashSet<NaiveDate> = HashSet::new();
    for cal in &controller.calibrations {
        if !dates.insert(cal.date) {
            return Err(ValidationError::DuplicateName {
                name: cal.date.to_string(),
                context: format!("controller '{}' calibration dates", controller.name),
            });
        }
        if let Some(overrange) = cal.overrange {
            if !(overrange >= 0.0 && overrange.is_finite()) {
                return Err(ValidationError::InvalidValue {
                    field: format!("controller '{}' overrange", controller.name),
                    value: overrange.to_string(),
                    reason: "must be finite and non-negative".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn check_name(name: &str, context: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: format!("{context} name"),
            value: name.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// `latest` or `YYYY-MM-DD`.
pub(crate) fn parse_selector(text: &str) -> Result<Option<NaiveDate>, String> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("latest") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| format!("expected 'latest' or a date: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use std::collections::BTreeMap;

    fn controller(name: &str, dates: &[(i32, u32, u32)]) -> ControllerDef {
        ControllerDef {
            name: name.to_string(),
            info: None,
            device: None,
            calibrations: dates
                .iter()
                .map(|&(y, m, d)| CalibrationDef {
                    date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    gas: GasDef::Text("N2=*".into()),
                    temperature: Scalar::from("273K"),
                    method: "linear".into(),
                    overrange: None,
                    params: BTreeMap::new(),
                })
                .collect(),
        }
    }

    fn line(name: &str, controller: Option<&str>) -> LineDef {
        LineDef {
            name: name.to_string(),
            gas: GasDef::Text("N2=*".into()),
            device: controller.map(|c| LineDeviceDef {
                controller: c.to_string(),
                calibration: "latest".into(),
            }),
        }
    }

    #[test]
    fn accepts_consistent_config() {
        let config = Config {
            logging: None,
            controllers: vec![controller("A", &[(2024, 1, 1), (2024, 2, 1)])],
            lines: vec![line("n2", Some("A")), line("vent", None)],
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_names_rejected() {
        let config = Config {
            controllers: vec![controller("A", &[]), controller("A", &[])],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::DuplicateName { .. })
        ));

        let config = Config {
            lines: vec![line("x", None), line("x", None)],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn unknown_controller_rejected() {
        let config = Config {
            controllers: vec![controller("A", &[])],
            lines: vec![line("n2", Some("B"))],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::MissingReference { .. })
        ));
    }

    #[test]
    fn duplicate_calibration_dates_rejected() {
        let config = Config {
            controllers: vec![controller("A", &[(2024, 1, 1), (2024, 1, 1)])],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn bad_selector_and_level_rejected() {
        let mut bad_line = line("n2", Some("A"));
        if let Some(device) = bad_line.device.as_mut() {
            device.calibration = "newest".into();
        }
        let config = Config {
            controllers: vec![controller("A", &[])],
            lines: vec![bad_line],
            ..Config::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ValidationError::InvalidValue { .. })
        ));

        let config = Config {
            logging: Some(LoggingDef {
                level: "loud".into(),
            }),
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn selector_parsing() {
        assert_eq!(parse_selector("latest"), Ok(None));
        assert_eq!(
            parse_selector("2024-06-20"),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 20))
        );
        assert!(parse_selector("June").is_err());
    }
}
