//! mf-project: controller and line configuration files.
//!
//! Files are YAML or JSON. Loading validates the structure; [`Config::build`]
//! parses quantities and compositions and produces a [`Setup`].

pub mod build;
pub mod schema;
pub mod validate;

pub use build::{LineSelection, Setup};
pub use schema::*;
pub use validate::{ValidationError, validate_config};

use mf_devices::CalibrationError;
use mf_gas::{CompositionError, UnitError};
use std::path::Path;
use tracing::info;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Controller '{controller}': {source}")]
    Controller {
        controller: String,
        #[source]
        source: CalibrationError,
    },

    #[error("Line '{line}': {source}")]
    Line {
        line: String,
        #[source]
        source: CalibrationError,
    },

    #[error("{context}: {source}")]
    Gas {
        context: String,
        #[source]
        source: CompositionError,
    },

    #[error("{context}: {source}")]
    Unit {
        context: String,
        #[source]
        source: UnitError,
    },

    #[error("Unknown line '{name}'")]
    UnknownLine { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn from_yaml_str(content: &str) -> ProjectResult<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn from_json_str(content: &str) -> ProjectResult<Config> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_yaml(path: &Path) -> ProjectResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config = from_yaml_str(&content)?;
    loaded(path, &config);
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &Config) -> ProjectResult<()> {
    validate_config(config)?;
    let content = serde_yaml::to_string(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config = from_json_str(&content)?;
    loaded(path, &config);
    Ok(config)
}

pub fn save_json(path: &Path, config: &Config) -> ProjectResult<()> {
    validate_config(config)?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load by extension: `.json` as JSON, anything else as YAML.
pub fn load(path: &Path) -> ProjectResult<Config> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_json(path),
        _ => load_yaml(path),
    }
}

fn loaded(path: &Path, config: &Config) {
    info!(
        path = %path.display(),
        controllers = config.controllers.len(),
        lines = config.lines.len(),
        "configuration loaded"
    );
}
