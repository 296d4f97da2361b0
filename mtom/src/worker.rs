//! The re-exec'd worker entry point: binds one mass to one `WtcCell` and
//! runs the dynamics simulation to termination.
//!
//! Each worker is fresh per epoch and exits once its mass has a terminal
//! status — a new process gives each analyzer subprocess a clean slate
//! rather than reusing one across an epoch's whole grid.
//!
//! Workers are never invoked directly by a user — `mtom` re-execs its own
//! binary with [`WORKER_MARKER`] as the first argument and the worker
//! reads its assignment back out of argv.

use std::path::PathBuf;
use std::time::Duration;

use mtom_sim::QpropAnalyzer;
use mtom_telemetry::WtcWriter;

use crate::results;

/// Sentinel first argument that routes a re-exec'd process into
/// [`run`] instead of the normal CLI (`cli::Args::parse`).
pub const WORKER_MARKER: &str = "__mtom_worker__";

/// Environment variable carrying an optional per-step analyzer deadline in
/// milliseconds. Unset means the analyzer call can block indefinitely.
pub const TIMEOUT_ENV_VAR: &str = "MTOM_ANALYZER_TIMEOUT_MS";

/// Positional arguments a worker process expects after [`WORKER_MARKER`].
pub struct WorkerArgs {
    pub config_path: PathBuf,
    pub mass: f64,
    pub telemetry_path: PathBuf,
    pub index: usize,
    pub cell_count: usize,
}

impl WorkerArgs {
    /// Build the argv tail a parent process passes to `Command::arg` when
    /// spawning a worker (everything after [`WORKER_MARKER`]).
    pub fn to_argv(&self) -> Vec<String> {
        vec![
            self.config_path.display().to_string(),
            self.mass.to_string(),
            self.telemetry_path.display().to_string(),
            self.index.to_string(),
            self.cell_count.to_string(),
        ]
    }

    fn parse(argv: &[String]) -> Option<Self> {
        if argv.len() < 5 {
            return None;
        }
        Some(Self {
            config_path: PathBuf::from(&argv[0]),
            mass: argv[1].parse().ok()?,
            telemetry_path: PathBuf::from(&argv[2]),
            index: argv[3].parse().ok()?,
            cell_count: argv[4].parse().ok()?,
        })
    }
}

/// Process exit codes a worker reports. The parent never trusts these for
/// bracket classification — the authoritative outcome is the final
/// `ProcessStatus` left in the telemetry cell — but they're useful for
/// postmortem logging when a worker crashes outright.
pub const EXIT_SUCCESS_TAKEOFF: i32 = 0;
pub const EXIT_FAILED_VELOCITY: i32 = 1;
pub const EXIT_ANALYZER_ERROR: i32 = 2;
pub const EXIT_BAD_ARGS: i32 = 64;

/// Run one worker to completion. Returns the process exit code.
pub fn run(argv: &[String]) -> i32 {
    let args = match WorkerArgs::parse(argv) {
        Some(args) => args,
        None => {
            eprintln!("mtom worker: malformed invocation");
            return EXIT_BAD_ARGS;
        }
    };

    let config = match mtom_common::config::parse(&args.config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("mtom worker: failed to load configuration: {err}");
            return EXIT_BAD_ARGS;
        }
    };

    let writer = match WtcWriter::attach(&args.telemetry_path, args.cell_count, args.index) {
        Ok(writer) => writer,
        Err(err) => {
            eprintln!("mtom worker: failed to attach telemetry: {err}");
            return EXIT_BAD_ARGS;
        }
    };

    let mut analyzer = QpropAnalyzer::new();
    if let Ok(raw) = std::env::var(TIMEOUT_ENV_VAR) {
        if let Ok(ms) = raw.parse::<u64>() {
            analyzer = analyzer.with_timeout(Duration::from_millis(ms));
        }
    }

    let (status, trace) = mtom_sim::simulate(&config, args.mass, &analyzer, &writer);

    if let Err(err) = results::write_trace(&config, args.mass, &trace) {
        tracing::warn!(mass = args.mass, error = %err, "failed to persist worker trace");
    }

    use mtom_common::ProcessStatus;
    match status {
        ProcessStatus::SuccessTakeoff => EXIT_SUCCESS_TAKEOFF,
        ProcessStatus::FailedVelocity => EXIT_FAILED_VELOCITY,
        _ => EXIT_ANALYZER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_round_trips_through_parse() {
        let args = WorkerArgs {
            config_path: PathBuf::from("/tmp/config.json"),
            mass: 1.5,
            telemetry_path: PathBuf::from("/dev/shm/mtom_x.wtc"),
            index: 2,
            cell_count: 5,
        };
        let argv = args.to_argv();
        let parsed = WorkerArgs::parse(&argv).unwrap();
        assert_eq!(parsed.config_path, args.config_path);
        assert_eq!(parsed.mass, args.mass);
        assert_eq!(parsed.telemetry_path, args.telemetry_path);
        assert_eq!(parsed.index, args.index);
        assert_eq!(parsed.cell_count, args.cell_count);
    }

    #[test]
    fn short_argv_fails_to_parse() {
        assert!(WorkerArgs::parse(&["only".to_string(), "two".to_string()]).is_none());
    }
}
