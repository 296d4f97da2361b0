//! Shared-memory segment backing the Worker Telemetry Channel.
//!
//! A single-platform, file-backed mapping: the optimizer and its workers are
//! always on the same host, so no NUMA placement or huge-page handling is
//! needed here.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::cell::WtcCell;
use crate::error::{TelemetryError, TelemetryResult};

const CELL_SIZE: usize = std::mem::size_of::<WtcCell>();

/// A memory-mapped array of `N` [`WtcCell`]s, one per worker.
pub struct TelemetrySegment {
    mmap: MmapMut,
    cell_count: usize,
    path: PathBuf,
}

impl TelemetrySegment {
    /// Create a new segment sized for `cell_count` workers at a path derived
    /// from `identifier`. Prefers `/dev/shm` (tmpfs) and falls back to the
    /// system temp directory when unavailable (non-Linux hosts, containers
    /// without `/dev/shm` mounted).
    pub fn create(identifier: &str, cell_count: usize) -> TelemetryResult<Self> {
        if cell_count == 0 {
            return Err(TelemetryError::InvalidCellCount { count: cell_count });
        }

        let path = segment_path(identifier, std::process::id());
        if path.exists() {
            return Err(TelemetryError::AlreadyExists {
                path: path.display().to_string(),
            });
        }

        let size = cell_count * CELL_SIZE;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(size as u64)?;

        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };

        let segment = Self {
            mmap,
            cell_count,
            path,
        };
        for i in 0..cell_count {
            segment.cell(i).zero();
        }
        Ok(segment)
    }

    /// Attach to an existing segment at `path`, created by [`Self::create`]
    /// in another process. `cell_count` must match the creator's.
    pub fn attach(path: &Path, cell_count: usize) -> TelemetryResult<Self> {
        if !path.exists() {
            return Err(TelemetryError::NotFound {
                path: path.display().to_string(),
            });
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = cell_count * CELL_SIZE;
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        Ok(Self {
            mmap,
            cell_count,
            path: path.to_path_buf(),
        })
    }

    /// Path to the backing file, passed to worker processes so they can attach.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// Borrow the cell at `index`. The cell's internal atomics provide
    /// synchronization; `&self` suffices for concurrent publish/snapshot.
    pub fn cell(&self, index: usize) -> &WtcCell {
        assert!(index < self.cell_count, "cell index out of range");
        let base = self.mmap.as_ptr() as *const WtcCell;
        // SAFETY: the mapping is sized to `cell_count * CELL_SIZE` bytes and
        // `WtcCell` is `repr(C, align(64))`; the mapping itself is
        // page-aligned, hence each cell offset is 64-byte aligned.
        unsafe { &*base.add(index) }
    }

    /// Zero every cell. Called at the start of each epoch.
    pub fn zero_all(&self) {
        for i in 0..self.cell_count {
            self.cell(i).zero();
        }
    }
}

/// Try `/dev/shm` first (tmpfs, avoids disk IO); fall back to the system
/// temp directory when it doesn't exist (non-Linux hosts, containers
/// without `/dev/shm` mounted).
fn segment_path(identifier: &str, pid: u32) -> PathBuf {
    let name = format!("mtom_{identifier}_{pid}.wtc");
    let shm_dir = Path::new("/dev/shm");
    if shm_dir.is_dir() {
        shm_dir.join(name)
    } else {
        std::env::temp_dir().join(name)
    }
}
