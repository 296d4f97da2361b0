//! Command-line surface and worker-count resolution.

use std::path::PathBuf;

use clap::Parser;
use tracing::{warn, Level};
use tracing_subscriber::EnvFilter;

use mtom_common::consts::MIN_PROCESSES;

use crate::error::CliError;

/// Parallel bracketing optimizer for aircraft Maximum Take-Off Mass.
#[derive(Parser, Debug)]
#[command(name = "mtom")]
#[command(version)]
#[command(about = "Parallel bracketing optimizer for aircraft Maximum Take-Off Mass")]
#[command(long_about = None)]
pub struct Args {
    /// Path to a JSON run configuration.
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Worker process count. Defaults to `max(3, cores-1)`; out-of-range
    /// values are silently clamped to `[3, cores-1]` with a warning.
    #[arg(short = 'p', long = "processes")]
    pub processes: Option<usize>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    pub json: bool,
}

/// Resolve the worker count from the CLI request and the host's core count:
/// `N = clamp(user_choice, 3, physical_cores-1)`. Fewer than 4 cores is
/// fatal since `cores-1` would then fall below the floor of 3.
pub fn resolve_process_count(requested: Option<usize>, cores: usize) -> Result<usize, CliError> {
    if cores < MIN_PROCESSES + 1 {
        return Err(CliError::SystemResources(format!(
            "at least {} CPU cores are required to run {} worker(s), found {cores}",
            MIN_PROCESSES + 1,
            MIN_PROCESSES
        )));
    }

    let max_allowed = cores - 1;
    match requested {
        None => Ok(max_allowed),
        Some(n) if n < MIN_PROCESSES => {
            warn!(
                requested = n,
                clamped_to = MIN_PROCESSES,
                "requested process count below the floor of {MIN_PROCESSES}, clamping up"
            );
            Ok(MIN_PROCESSES)
        }
        Some(n) if n > max_allowed => {
            warn!(
                requested = n,
                clamped_to = max_allowed,
                "requested process count exceeds cores-1, clamping down"
            );
            Ok(max_allowed)
        }
        Some(n) => Ok(n),
    }
}

/// Initialize the tracing subscriber according to the verbosity/format flags.
pub fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_cores_minus_one() {
        assert_eq!(resolve_process_count(None, 8).unwrap(), 7);
    }

    #[test]
    fn clamps_low_request_up_to_floor() {
        assert_eq!(resolve_process_count(Some(1), 8).unwrap(), MIN_PROCESSES);
    }

    #[test]
    fn clamps_high_request_down_to_cores_minus_one() {
        assert_eq!(resolve_process_count(Some(100), 8).unwrap(), 7);
    }

    #[test]
    fn in_range_request_is_unchanged() {
        assert_eq!(resolve_process_count(Some(4), 8).unwrap(), 4);
    }

    #[test]
    fn too_few_cores_is_a_system_resources_error() {
        assert!(matches!(
            resolve_process_count(None, 3),
            Err(CliError::SystemResources(_))
        ));
    }
}
