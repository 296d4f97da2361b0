//! MTOM Optimizer: the bracketing/search controller.
//!
//! Each epoch lays out a grid of candidate masses, evaluates them (in
//! parallel, for a real run), classifies the results, and moves the bracket;
//! the three epoch outcomes — rewind, extend, narrow — are mutually
//! exclusive.
//!
//! [`EpochRunner`] is a trait-at-the-seam, in the same style as
//! `mtom_sim::ThrustSource`, that separates the pure bracket arithmetic —
//! directly unit-testable — from the process-spawning glue in
//! [`ProcessEpochRunner`].

use std::process::{Child, Command};
use std::time::Duration;

use tracing::info;

use mtom_common::{ProcessStatus, ResultState};
use mtom_telemetry::{TelemetrySegment, WtcReader};

use crate::display::ProgressDisplay;
use crate::error::CliError;
use crate::worker::{WorkerArgs, WORKER_MARKER};

/// Evaluates every mass in a grid for one epoch and returns each worker's
/// final [`ProcessStatus`], in grid order. Implemented by
/// [`ProcessEpochRunner`] for real runs (spawns OS processes, drives the
/// telemetry channel and progress display) and by test doubles for the
/// pure bracket-logic tests below.
pub trait EpochRunner {
    fn run_epoch(&mut self, grid: &[f64]) -> Vec<ProcessStatus>;
}

/// Round to `precision` decimal places, close enough to a standard
/// round-half-away-from-zero for the grid arithmetic this search performs.
fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// `n` evenly spaced points from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Drop the first and last element of a linspace, leaving its `n-2`
/// interior points.
fn interior(points: &[f64]) -> Vec<f64> {
    if points.len() <= 2 {
        return Vec::new();
    }
    points[1..points.len() - 1].to_vec()
}

/// One epoch's classification pass: an ascending sweep finds the largest
/// successful grid mass (ties broken toward the largest index); the
/// equivalent descending sweep (computed as `j = n-1-i` in the same loop)
/// finds the smallest failing grid mass.
/// Returns `(index of the largest success this epoch, updated lower, updated upper)`.
fn classify_epoch(
    statuses: &[ProcessStatus],
    grid: &[f64],
    lower0: f64,
    upper0: f64,
) -> (Option<usize>, f64, f64) {
    let mut lower = lower0;
    let mut upper = upper0;
    let mut best_success = None;
    let n = grid.len();

    for i in 0..n {
        if statuses[i] == ProcessStatus::SuccessTakeoff && grid[i] >= lower {
            lower = grid[i];
            best_success = Some(i);
        }

        let j = n - 1 - i;
        if statuses[j].is_failure() && grid[j] <= upper {
            upper = grid[j];
        }
    }

    (best_success, lower, upper)
}

/// The bracketing/search controller. Pure with respect to process spawning —
/// all of that is delegated to the [`EpochRunner`] passed to [`Self::run`].
pub struct MtomOptimizer {
    n_processes: usize,
    arithmetic_precision: u32,
}

impl MtomOptimizer {
    pub fn new(n_processes: usize, arithmetic_precision: u32) -> Self {
        Self {
            n_processes,
            arithmetic_precision,
        }
    }

    /// Run the bracketing search to one of the three terminal outcomes.
    /// `mass_range` seeds the initial bracket and backup range; `runner`
    /// evaluates each epoch's grid.
    pub fn run<R: EpochRunner>(&self, mass_range: (f64, f64), runner: &mut R) -> ResultState {
        let precision = self.arithmetic_precision;
        let mut lower = mass_range.0;
        let mut upper = mass_range.1;
        let mut lower_backup = round_to(mass_range.0, precision);
        let mut upper_backup = round_to(mass_range.1, precision);

        let mut grid = linspace(mass_range.0, mass_range.1, self.n_processes);
        let mut epoch: u64 = 0;

        loop {
            for mass in grid.iter_mut() {
                *mass = round_to(*mass, precision);
            }

            let scale = 10f64.powi(precision as i32);
            let top = (grid[grid.len() - 1] * scale) as i64;
            let bottom = (grid[0] * scale) as i64;
            if top - bottom <= 1 {
                return ResultState::MtomFound { mass: grid[0] };
            }

            info!(epoch, grid = ?grid, lower, upper, "starting MTOM epoch");
            let statuses = runner.run_epoch(&grid);
            debug_assert_eq!(statuses.len(), grid.len());

            let (best_success, new_lower, new_upper) = classify_epoch(&statuses, &grid, lower, upper);
            lower = new_lower;
            upper = new_upper;

            match best_success {
                None => {
                    if lower_backup < grid[0] {
                        let rewound = linspace(lower_backup, grid[0], self.n_processes + 2);
                        upper_backup = grid[0];
                        grid = interior(&rewound);
                    } else {
                        return ResultState::MassLowerboundBeyondMtom;
                    }
                }
                Some(idx) if idx == grid.len() - 1 => {
                    let winning_mass = grid[idx];
                    if upper_backup > grid[grid.len() - 1] {
                        let extended = linspace(grid[grid.len() - 1], upper_backup, self.n_processes + 2);
                        lower_backup = grid[grid.len() - 1];
                        grid = interior(&extended);
                    } else {
                        return ResultState::MassUpperboundBelowMtom { mass: winning_mass };
                    }
                }
                Some(_) => {
                    grid = interior(&linspace(lower, upper, self.n_processes + 2));
                    lower_backup = lower;
                    upper_backup = upper;
                }
            }

            epoch += 1;
        }
    }
}

/// Production [`EpochRunner`]: spawns `N` re-exec'd worker processes per
/// epoch, polls the telemetry channel to drive the [`ProgressDisplay`] until
/// every worker terminates, then reads final statuses from the telemetry
/// channel rather than trusting process exit codes — a worker's own exit
/// code is postmortem information only.
pub struct ProcessEpochRunner<'a> {
    config: &'a mtom_common::RunConfiguration,
    config_path: std::path::PathBuf,
    reader: WtcReader,
    display: ProgressDisplay,
    analyzer_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl<'a> ProcessEpochRunner<'a> {
    pub fn new(
        config: &'a mtom_common::RunConfiguration,
        config_path: std::path::PathBuf,
        n_processes: usize,
        analyzer_timeout: Option<Duration>,
    ) -> Result<Self, CliError> {
        let segment = TelemetrySegment::create(&config.identifier, n_processes)?;
        let reader = WtcReader::new(segment);
        let display = ProgressDisplay::new(
            &config.identifier,
            config.takeoff_displacement,
            config.arithmetic_precision,
            n_processes,
        );

        Ok(Self {
            config,
            config_path,
            reader,
            display,
            analyzer_timeout,
            poll_interval: Duration::from_millis(100),
        })
    }

    fn spawn_worker(&self, exe: &std::path::Path, index: usize, mass: f64) -> Result<Child, CliError> {
        let args = WorkerArgs {
            config_path: self.config_path.clone(),
            mass,
            telemetry_path: self.reader.path().to_path_buf(),
            index,
            cell_count: self.reader.cell_count(),
        };

        let mut command = Command::new(exe);
        command.arg(WORKER_MARKER).args(args.to_argv());
        if let Some(timeout) = self.analyzer_timeout {
            command.env(crate::worker::TIMEOUT_ENV_VAR, timeout.as_millis().to_string());
        }

        command.spawn().map_err(|source| CliError::WorkerSpawn {
            config: self.config_path.clone(),
            source,
        })
    }

    /// Consume `self`, closing the progress display rows in order. Call
    /// once the optimizer returns its final `ResultState`.
    pub fn finish(self) {
        self.display.finish();
    }
}

impl<'a> EpochRunner for ProcessEpochRunner<'a> {
    fn run_epoch(&mut self, grid: &[f64]) -> Vec<ProcessStatus> {
        self.reader.zero_all();
        for (i, &mass) in grid.iter().enumerate() {
            self.reader.set_mass(i, mass);
        }
        self.display.begin_epoch(grid);

        let exe = match std::env::current_exe() {
            Ok(exe) => exe,
            Err(err) => {
                tracing::error!(error = %err, "cannot resolve current executable, aborting epoch");
                return vec![ProcessStatus::AnalyzerError; grid.len()];
            }
        };

        let mut children: Vec<Option<Child>> = grid
            .iter()
            .enumerate()
            .map(|(i, &mass)| match self.spawn_worker(&exe, i, mass) {
                Ok(child) => Some(child),
                Err(err) => {
                    tracing::error!(index = i, error = %err, "failed to spawn worker");
                    None
                }
            })
            .collect();

        loop {
            let snapshots = self.reader.snapshot_all();
            self.display.refresh(grid, &snapshots);

            let any_alive = children.iter_mut().any(|child| match child {
                Some(c) => matches!(c.try_wait(), Ok(None)),
                None => false,
            });
            if !any_alive {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }

        for child in children.iter_mut().flatten() {
            match child.wait() {
                Ok(status) if !status.success() => {
                    tracing::debug!(code = ?status.code(), "worker exited non-zero (postmortem only)");
                }
                Err(err) => tracing::warn!(error = %err, "failed to join worker"),
                _ => {}
            }
        }

        self.reader
            .snapshot_all()
            .iter()
            .map(|snapshot| snapshot.status.unwrap_or(ProcessStatus::AnalyzerError))
            .collect()
    }
}

impl<'a> Drop for ProcessEpochRunner<'a> {
    fn drop(&mut self) {
        let _ = self.config;
        std::fs::remove_file(self.reader.path()).ok();
    }
}
