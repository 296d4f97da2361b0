//! Top-level error taxonomy for the `mtom` binary.
//!
//! Every variant here is fatal before any worker is forked — in-core worker
//! failures never surface as a `CliError`, they flow through
//! `ProcessStatus`/`ResultState` classification instead (see
//! `optimizer.rs`).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort the run before the optimizer's epoch loop starts.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file failed to load or validate.
    #[error(transparent)]
    Config(#[from] mtom_common::ConfigError),

    /// Telemetry segment creation failed (e.g. `/dev/shm` unwritable).
    #[error(transparent)]
    Telemetry(#[from] mtom_telemetry::TelemetryError),

    /// Fewer than 4 cores, or a requested process count below the floor of 3.
    #[error("insufficient system resources: {0}")]
    SystemResources(String),

    /// Failed to spawn a worker process.
    #[error("failed to spawn worker process for config {config}: {source}")]
    WorkerSpawn {
        config: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
