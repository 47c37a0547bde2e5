//! mf-core: stable foundation for mixflow.
//!
//! Contains:
//! - units (uom SI types + constructors for flows, temperatures, voltages)
//! - numeric (Real + tolerances + float helpers)
//! - ids (compact controller handles)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{MfError, MfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
