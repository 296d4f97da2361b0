//! Per-worker publish handle, bound to exactly one cell for the worker's lifetime.

use std::path::Path;
use std::sync::Arc;

use mtom_common::ProcessStatus;

use crate::error::TelemetryResult;
use crate::segment::TelemetrySegment;

/// The write side of one worker's telemetry cell. A worker owns exactly one
/// `WtcWriter` and is the sole writer to its cell for the whole epoch.
pub struct WtcWriter {
    segment: Arc<TelemetrySegment>,
    index: usize,
}

impl WtcWriter {
    /// Attach to a segment created by the optimizer and bind to `index`.
    pub fn attach(path: &Path, cell_count: usize, index: usize) -> TelemetryResult<Self> {
        let segment = TelemetrySegment::attach(path, cell_count)?;
        Ok(Self {
            segment: Arc::new(segment),
            index,
        })
    }

    pub fn set_mass(&self, mass: f64) {
        self.segment.cell(self.index).set_mass(mass);
    }

    pub fn publish_status(&self, status: ProcessStatus) {
        self.segment.cell(self.index).publish_status(status);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn publish_step(&self, t: f64, x: f64, v: f64, a: f64, thrust: f64, drag: f64) {
        self.segment
            .cell(self.index)
            .publish_step(t, x, v, a, thrust, drag);
    }
}
