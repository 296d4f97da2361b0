//! Error type for telemetry segment operations.

use thiserror::Error;

/// Errors that can occur while creating, attaching to, or sizing a telemetry segment.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A segment already exists at the target path.
    #[error("telemetry segment already exists: {path}")]
    AlreadyExists {
        /// Segment path.
        path: String,
    },

    /// No segment exists at the target path.
    #[error("telemetry segment not found: {path}")]
    NotFound {
        /// Segment path.
        path: String,
    },

    /// The requested cell count would produce a zero-sized or absurd segment.
    #[error("invalid cell count: {count}")]
    InvalidCellCount {
        /// Requested cell count.
        count: usize,
    },

    /// IO error creating, opening, or mapping the segment file.
    #[error("IO error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
