//! Shared run configuration, status enumerations, and constants consumed by
//! every other MTOM crate.

pub mod config;
pub mod consts;
pub mod status;

pub use config::{AeroConfig, ConfigError, RunConfiguration, Setpoint};
pub use status::{ProcessStatus, ResultState};
