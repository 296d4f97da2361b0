//! Persisted state layout: per-worker trace serialization and final-plot
//! path naming. Plotting itself happens downstream, outside this binary;
//! this module only computes the contract paths, it never renders an image.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mtom_common::consts::MASS_FILENAME_DECIMALS;
use mtom_common::RunConfiguration;
use mtom_sim::SimulationTrace;

/// Format a mass to the fixed 16-decimal-digit filename fragment used in
/// result file names.
fn mass_fragment(mass: f64) -> String {
    format!("{:.*}", MASS_FILENAME_DECIMALS, mass)
}

/// Path a worker's trace is persisted to: `<results_directory>/<identifier>-<mass-to-16-digits>.json`.
pub fn trace_path(config: &RunConfiguration, mass: f64) -> PathBuf {
    config
        .results_directory
        .join(format!("{}-{}.json", config.identifier, mass_fragment(mass)))
}

/// Serialize one worker's trace to its results-directory path.
pub fn write_trace(config: &RunConfiguration, mass: f64, trace: &SimulationTrace) -> io::Result<PathBuf> {
    let path = trace_path(config, mass);
    let body = serde_json::to_vec_pretty(trace)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&path, body)?;
    Ok(path)
}

/// Re-read a previously persisted trace (the parent's final-trace
/// aggregation path: workers persist to disk rather than returning their
/// trace over a cross-process queue).
pub fn read_trace(path: &Path) -> io::Result<SimulationTrace> {
    let body = fs::read(path)?;
    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// The final-plot path a downstream plotting tool would render to:
/// `<identifier>-<mass>-<vf>.png`. Rendering is out of scope here; only the
/// naming contract is computed.
pub fn plot_path(config: &RunConfiguration, mass: f64, final_velocity: f64, precision: u32) -> PathBuf {
    config.results_directory.join(format!(
        "{}-{:.*}-{:.*}.png",
        config.identifier, precision as usize, mass, precision as usize, final_velocity
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtom_common::{AeroConfig, Setpoint};

    fn test_config(dir: &Path) -> RunConfiguration {
        RunConfiguration {
            identifier: "mycraft".into(),
            results_directory: dir.to_path_buf(),
            propeller_file: dir.to_path_buf(),
            motor_file: dir.to_path_buf(),
            timestep_size: 0.1,
            mass_range: (1.0, 2.0),
            arithmetic_precision: 2,
            takeoff_displacement: 5.0,
            setpoint: Setpoint {
                velocity: 0.1,
                voltage: 0.0,
                dbeta: 0.0,
                current: 0.0,
                torque: 0.0,
                thrust: 0.0,
                pele: 0.0,
                rpm: 0.0,
            },
            aero: AeroConfig {
                fluid_density: 1.0,
                true_airspeed: Some(1.0),
                drag_coefficient: 1.0,
                reference_area: 1.0,
                acceleration_gravity: 9.81,
                lift_coefficient: 2.0,
            },
        }
    }

    #[test]
    fn trace_path_uses_sixteen_decimal_digits() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let path = trace_path(&config, 1.5);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, "mycraft-1.5000000000000000.json");
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let trace = SimulationTrace {
            t: vec![0.0, 0.1],
            x: vec![0.0, 1.0],
            v: vec![0.1, 0.2],
            a: vec![1.0],
            thrust: vec![5.0],
            drag: vec![1.0],
        };
        let path = write_trace(&config, 1.5, &trace).unwrap();
        let read_back = read_trace(&path).unwrap();
        assert_eq!(read_back, trace);
    }

    #[test]
    fn plot_path_names_mass_and_final_velocity() {
        let tmp = tempfile::tempdir().unwrap();
        let config = test_config(tmp.path());
        let path = plot_path(&config, 1.5, 12.3, 2);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "mycraft-1.50-12.30.png"
        );
    }
}
