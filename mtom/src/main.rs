//! `mtom`: parallel bracketing optimizer for aircraft Maximum Take-Off Mass.
//!
//! Before `clap::Parser::parse()` ever sees argv, a re-exec'd worker is
//! recognized by [`worker::WORKER_MARKER`] as `argv[1]` and routed straight
//! into [`worker::run`], bypassing the documented CLI surface entirely
//! (`cli::Args` never mentions worker mode).

mod cli;
mod display;
mod error;
mod optimizer;
mod results;
mod worker;

use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use mtom_common::ResultState;

use crate::cli::Args;
use crate::error::CliError;
use crate::optimizer::{MtomOptimizer, ProcessEpochRunner};
use crate::worker::WORKER_MARKER;

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    if argv.len() > 1 && argv[1] == WORKER_MARKER {
        std::process::exit(worker::run(&argv[2..]));
    }

    let args = Args::parse();
    cli::setup_tracing(&args);

    match run(&args) {
        Ok(_result) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = %err, "mtom aborted before completion");
            std::process::exit(1);
        }
    }
}

/// Top-level run: load configuration, resolve the worker pool size, drive
/// the bracketing search to one of its three terminal outcomes, and log the
/// final summary.
fn run(args: &Args) -> Result<ResultState, CliError> {
    let config = mtom_common::config::load(&args.config)?;

    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let n_processes = cli::resolve_process_count(args.processes, cores)?;

    info!(
        identifier = %config.identifier,
        n_processes,
        mass_range = ?config.mass_range,
        "starting MTOM search"
    );

    // MTOM_ANALYZER_TIMEOUT_MS bounds one worker's per-step analyzer call;
    // unset means "wait indefinitely".
    let analyzer_timeout = std::env::var(worker::TIMEOUT_ENV_VAR)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis);

    let mut runner = ProcessEpochRunner::new(&config, args.config.clone(), n_processes, analyzer_timeout)?;
    let optimizer = MtomOptimizer::new(n_processes, config.arithmetic_precision);
    let result = optimizer.run(config.mass_range, &mut runner);
    runner.finish();

    report_result(&config, &result);
    Ok(result)
}

/// Log the final summary and warn if the winning trace overshot
/// `takeoff_displacement` enough to suggest the timestep is too coarse.
/// `MassLowerboundBeyondMtom` has no winning trace to summarize and logs at
/// `error` directly, without a results summary.
fn report_result(config: &mtom_common::RunConfiguration, result: &ResultState) {
    let mass = match result {
        ResultState::MtomFound { mass } => *mass,
        ResultState::MassUpperboundBelowMtom { mass } => *mass,
        ResultState::MassLowerboundBeyondMtom => {
            tracing::error!(
                mass_range = ?config.mass_range,
                "configured mass_range minimum already fails; MTOM is below the search range"
            );
            return;
        }
    };

    let precision = config.arithmetic_precision as usize;
    let stall_velocity = config.stall_velocity(mass);

    let trace = match results::read_trace(&results::trace_path(config, mass)) {
        Ok(trace) => trace,
        Err(err) => {
            warn!(mass, error = %err, "could not re-read winning trace for final summary");
            return;
        }
    };

    let lift_off_displacement = trace.final_position();
    match result {
        ResultState::MtomFound { .. } => info!(
            mass = %format!("{mass:.precision$}"),
            stall_velocity = %format!("{stall_velocity:.precision$}"),
            lift_off_displacement = %format!("{lift_off_displacement:.precision$}"),
            "MTOM found"
        ),
        ResultState::MassUpperboundBelowMtom { .. } => warn!(
            mass = %format!("{mass:.precision$}"),
            stall_velocity = %format!("{stall_velocity:.precision$}"),
            lift_off_displacement = %format!("{lift_off_displacement:.precision$}"),
            "configured mass_range maximum still succeeds; MTOM is above the search range"
        ),
        ResultState::MassLowerboundBeyondMtom => unreachable!("handled above"),
    }

    if let Some(previous) = trace.position_before_terminal() {
        let overshoot = lift_off_displacement - config.takeoff_displacement;
        let step = config.takeoff_displacement - previous;
        if step > 0.0 && overshoot > step {
            warn!(
                mass,
                overshoot,
                step_size = config.timestep_size,
                "winning worker overshot takeoff_displacement by more than one step; \
                 consider a smaller timestep_size"
            );
        }
    }
}
