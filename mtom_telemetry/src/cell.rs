//! The fixed-layout, field-granular telemetry cell.
//!
//! Each field is its own atomic; there is no cell-wide lock and no version
//! counter. Readers are only ever promised that an individual field's read
//! returns a value previously written, never cross-field consistency
//! mid-step, so `Ordering::Relaxed` is correct here: nothing downstream
//! orders one field's write against another's.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use mtom_common::ProcessStatus;

/// One worker's live telemetry, laid out for direct placement in a
/// memory-mapped segment shared across processes. Cache-line sized and
/// aligned so adjacent cells never false-share.
#[repr(C, align(64))]
pub struct WtcCell {
    status: AtomicU8,
    _pad: [u8; 7],
    mass: AtomicU64,
    t: AtomicU64,
    x: AtomicU64,
    v: AtomicU64,
    a: AtomicU64,
    thrust: AtomicU64,
    drag: AtomicU64,
}

const _: () = assert!(std::mem::size_of::<WtcCell>() == 64);

/// A point-in-time, field-by-field copy of a cell. May mix fields from
/// different steps if read mid-publish — callers must not assume internal
/// consistency except on a final, post-join snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSnapshot {
    pub status: Option<ProcessStatus>,
    pub mass: f64,
    pub t: f64,
    pub x: f64,
    pub v: f64,
    pub a: f64,
    pub thrust: f64,
    pub drag: f64,
}

impl WtcCell {
    /// Zero every field and reset status to `OptimizerSetup`. Called once at
    /// epoch start before any worker is forked.
    pub fn zero(&self) {
        self.status
            .store(ProcessStatus::OptimizerSetup as u8, Ordering::Relaxed);
        self.mass.store(0, Ordering::Relaxed);
        self.t.store(0, Ordering::Relaxed);
        self.x.store(0, Ordering::Relaxed);
        self.v.store(0, Ordering::Relaxed);
        self.a.store(0, Ordering::Relaxed);
        self.thrust.store(0, Ordering::Relaxed);
        self.drag.store(0, Ordering::Relaxed);
    }

    /// Set the target mass this worker is bound to for the epoch.
    pub fn set_mass(&self, mass: f64) {
        self.mass.store(mass.to_bits(), Ordering::Relaxed);
    }

    pub fn mass(&self) -> f64 {
        f64::from_bits(self.mass.load(Ordering::Relaxed))
    }

    /// Publish a live or terminal status.
    pub fn publish_status(&self, status: ProcessStatus) {
        self.status.store(status as u8, Ordering::Relaxed);
    }

    pub fn status(&self) -> Option<ProcessStatus> {
        ProcessStatus::from_u8(self.status.load(Ordering::Relaxed))
    }

    /// Publish the full (t, x, v, a, T, D) tuple for one step. Each field is
    /// stored independently — a concurrent reader may observe any subset of
    /// these writes already applied.
    #[allow(clippy::too_many_arguments)]
    pub fn publish_step(&self, t: f64, x: f64, v: f64, a: f64, thrust: f64, drag: f64) {
        self.t.store(t.to_bits(), Ordering::Relaxed);
        self.x.store(x.to_bits(), Ordering::Relaxed);
        self.v.store(v.to_bits(), Ordering::Relaxed);
        self.a.store(a.to_bits(), Ordering::Relaxed);
        self.thrust.store(thrust.to_bits(), Ordering::Relaxed);
        self.drag.store(drag.to_bits(), Ordering::Relaxed);
    }

    /// Read every field independently into a [`CellSnapshot`].
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            status: self.status(),
            mass: self.mass(),
            t: f64::from_bits(self.t.load(Ordering::Relaxed)),
            x: f64::from_bits(self.x.load(Ordering::Relaxed)),
            v: f64::from_bits(self.v.load(Ordering::Relaxed)),
            a: f64::from_bits(self.a.load(Ordering::Relaxed)),
            thrust: f64::from_bits(self.thrust.load(Ordering::Relaxed)),
            drag: f64::from_bits(self.drag.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> WtcCell {
        WtcCell {
            status: AtomicU8::new(0),
            _pad: [0; 7],
            mass: AtomicU64::new(0),
            t: AtomicU64::new(0),
            x: AtomicU64::new(0),
            v: AtomicU64::new(0),
            a: AtomicU64::new(0),
            thrust: AtomicU64::new(0),
            drag: AtomicU64::new(0),
        }
    }

    #[test]
    fn zeroed_cell_reads_back_zero() {
        let c = cell();
        c.set_mass(1.5);
        c.publish_step(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        c.publish_status(ProcessStatus::CheckingLimits);
        c.zero();

        let snap = c.snapshot();
        assert_eq!(snap.mass, 0.0);
        assert_eq!(snap.t, 0.0);
        assert_eq!(snap.status, Some(ProcessStatus::OptimizerSetup));
    }

    #[test]
    fn each_field_round_trips_independently() {
        let c = cell();
        c.set_mass(1.23456);
        c.publish_step(0.1, 0.2, 0.3, 0.4, 0.5, 0.6);
        c.publish_status(ProcessStatus::SuccessTakeoff);

        let snap = c.snapshot();
        assert_eq!(snap.mass, 1.23456);
        assert_eq!(snap.t, 0.1);
        assert_eq!(snap.x, 0.2);
        assert_eq!(snap.v, 0.3);
        assert_eq!(snap.a, 0.4);
        assert_eq!(snap.thrust, 0.5);
        assert_eq!(snap.drag, 0.6);
        assert_eq!(snap.status, Some(ProcessStatus::SuccessTakeoff));
    }

    #[test]
    fn cell_is_cache_line_sized() {
        assert_eq!(std::mem::size_of::<WtcCell>(), 64);
        assert_eq!(std::mem::align_of::<WtcCell>(), 64);
    }
}
