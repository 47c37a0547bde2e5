//! Configuration file schema.
//!
//! Quantities are kept as text (`"2.0L/min"`, `"273K"`) and only parsed when
//! the configuration is built, so a loaded file saves back unchanged.

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingDef>,
    #[serde(default)]
    pub controllers: Vec<ControllerDef>,
    #[serde(default)]
    pub lines: Vec<LineDef>,
}

impl Config {
    /// Configured log level, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().map(|l| l.level.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingDef {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceDef>,
    #[serde(default)]
    pub calibrations: Vec<CalibrationDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InfoDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, alias = "make", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "connection")]
pub enum DeviceDef {
    None,
    Analog {
        max_output_voltage: Scalar,
        max_input_voltage: Scalar,
    },
    FlowBus,
}

/// One dated calibration. Every key besides the named fields is a method
/// parameter (`offset`, `slope`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationDef {
    pub date: NaiveDate,
    pub gas: GasDef,
    pub temperature: Scalar,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrange: Option<f64>,
    #[serde(flatten)]
    pub params: BTreeMap<String, Scalar>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineDef {
    pub name: String,
    pub gas: GasDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<LineDeviceDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineDeviceDef {
    #[serde(alias = "mfc")]
    pub controller: String,
    /// `latest` or an ISO date.
    #[serde(default = "default_selector")]
    pub calibration: String,
}

fn default_selector() -> String {
    "latest".to_string()
}

/// Gas composition as text (`"NH3=0.979%, He=*"`) or as a mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GasDef {
    Text(String),
    Map(CompositionMap),
}

/// Number or text with a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Self::Number(x)
    }
}

/// Gas → amount mapping that keeps file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositionMap(pub Vec<(String, Scalar)>);

impl Serialize for CompositionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (gas, amount) in &self.0 {
            map.serialize_entry(gas, amount)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompositionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = CompositionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping from gas to amount")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, Scalar>()? {
                    entries.push(entry);
                }
                Ok(CompositionMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}
