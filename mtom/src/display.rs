//! Progress Display: an `N+1`-row TTY renderer driven by the optimizer's
//! poll loop, with no independent timer of its own. One header row shows
//! the config identifier, mass bracket, elapsed time, and epoch counter;
//! one row per worker carries a live description/postfix pair refreshed on
//! every poll tick, rendered with `indicatif::MultiProgress`.

use std::time::Instant;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use mtom_common::ProcessStatus;
use mtom_telemetry::CellSnapshot;

/// Renders the header row plus one row per worker, redrawn on every
/// [`ProgressDisplay::refresh`] call.
pub struct ProgressDisplay {
    header: ProgressBar,
    workers: Vec<ProgressBar>,
    identifier: String,
    takeoff_displacement: f64,
    precision: usize,
    started: Instant,
    epoch: u64,
}

fn message_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").expect("static template is valid")
}

impl ProgressDisplay {
    /// Build the `N+1` rows. Workers are shown in `Process i | m=-` form
    /// until the first [`Self::begin_epoch`] call supplies a grid.
    pub fn new(identifier: &str, takeoff_displacement: f64, arithmetic_precision: u32, n_processes: usize) -> Self {
        let multi = MultiProgress::new();
        let style = message_style();

        let header = multi.add(ProgressBar::new_spinner());
        header.set_style(style.clone());
        header.set_message(format!("Optimizing for MTOM | Config[{identifier}]: epoch 0"));

        let workers = (0..n_processes)
            .map(|i| {
                let bar = multi.add(ProgressBar::new(takeoff_displacement.max(1.0) as u64));
                bar.set_style(style.clone());
                bar.set_message(format!("Process {i} | m=- kg | [{:?}]", ProcessStatus::OptimizerSetup));
                bar
            })
            .collect();

        Self {
            header,
            workers,
            identifier: identifier.to_string(),
            takeoff_displacement,
            precision: arithmetic_precision as usize,
            started: Instant::now(),
            epoch: 0,
        }
    }

    /// Update the header and reset every worker's bar to `ForkingProcess`
    /// with its bound mass, at the start of each epoch.
    pub fn begin_epoch(&mut self, grid: &[f64]) {
        self.epoch += 1;
        let mass_width = grid
            .iter()
            .map(|m| format!("{:.*}", self.precision, m).len())
            .max()
            .unwrap_or(1);

        self.header.set_message(format!(
            "Optimizing for MTOM | Config[{}]: m=[{:.*}, {:.*}] kg ~ x={} m | Elapsed: {:.1}s | Epoch: {}",
            self.identifier,
            self.precision,
            grid.first().copied().unwrap_or(0.0),
            self.precision,
            grid.last().copied().unwrap_or(0.0),
            self.takeoff_displacement,
            self.started.elapsed().as_secs_f64(),
            self.epoch,
        ));

        for (i, (bar, mass)) in self.workers.iter().zip(grid).enumerate() {
            bar.set_position(0);
            bar.set_message(format!(
                "Process {i} | m={:>width$.*} kg | [{:?}]",
                self.precision,
                mass,
                ProcessStatus::ForkingProcess,
                width = mass_width
            ));
        }
    }

    /// Redraw every row from a whole-generation telemetry snapshot. Called
    /// from the optimizer's poll loop; there is no independent refresh timer.
    pub fn refresh(&self, grid: &[f64], snapshots: &[CellSnapshot]) {
        self.header.tick();
        let mass_width = grid
            .iter()
            .map(|m| format!("{:.*}", self.precision, m).len())
            .max()
            .unwrap_or(1);

        for (i, (bar, snapshot)) in self.workers.iter().zip(snapshots).enumerate() {
            let status = snapshot.status.unwrap_or(ProcessStatus::OptimizerSetup);
            let mass = grid.get(i).copied().unwrap_or(snapshot.mass);
            bar.set_position(snapshot.x.clamp(0.0, self.takeoff_displacement) as u64);
            bar.set_message(format!(
                "Process {i} | m={:>width$.*} kg | [{status:?}] | t={:.2} s | x={:.2} m | v={:.2} m/s | a={:.2} m/s^2 | T={:.2} N | D={:.2} N",
                self.precision,
                mass,
                snapshot.t,
                snapshot.x,
                snapshot.v,
                snapshot.a,
                snapshot.thrust,
                snapshot.drag,
                width = mass_width
            ));
        }
    }

    /// Close every row in order on exit.
    pub fn finish(self) {
        for bar in &self.workers {
            bar.finish_and_clear();
        }
        self.header.finish_and_clear();
    }
}
