//! Worker Telemetry Channel: fixed-layout shared-memory cells.
//!
//! One [`cell::WtcCell`] per worker, field-granular and lock-free. The
//! optimizer creates and owns the backing [`segment::TelemetrySegment`]
//! through a [`reader::WtcReader`]; each worker process attaches to the same
//! segment through a [`writer::WtcWriter`] bound to its own index.

pub mod cell;
pub mod error;
pub mod reader;
pub mod segment;
pub mod writer;

pub use cell::{CellSnapshot, WtcCell};
pub use error::{TelemetryError, TelemetryResult};
pub use reader::WtcReader;
pub use segment::TelemetrySegment;
pub use writer::WtcWriter;
