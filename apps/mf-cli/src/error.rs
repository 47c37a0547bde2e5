use mf_gas::{CompositionError, UnitError};
use mf_project::ProjectError;
use mf_solver::MixtureError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Composition: {0}")]
    Composition(#[from] CompositionError),

    #[error("{context}: {source}")]
    Unit {
        context: &'static str,
        #[source]
        source: UnitError,
    },

    #[error("Mixture: {0}")]
    Mixture(#[from] MixtureError),

    #[error("Invalid argument --{name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
}
