//! Run Configuration loading.
//!
//! Two-stage pipeline: deserialize the JSON into a raw, `Option`-heavy shape
//! with `serde_json`, then [`RunConfiguration::from_raw`] fills defaults and
//! checks the domain invariants. Nothing downstream of [`load`] ever sees a
//! partially-validated configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a Run Configuration. The `ConfigShape` and
/// `ConfigDomain` variants are both fatal and reported before any worker is
/// forked.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The JSON does not match the expected configuration shape.
    #[error("structure of configuration file \"{path}\" is invalid\n\nGOT:\n{got}\n\nEXPECTED:\n{expected}")]
    ConfigShape {
        /// Path to the offending file.
        path: PathBuf,
        /// What was actually found (rendered from the parse error).
        got: String,
        /// Description of the expected shape.
        expected: String,
    },

    /// A numeric or filesystem domain invariant was violated.
    #[error("configuration domain invariant violated: {0}")]
    ConfigDomain(String),

    /// Failed to reset/create the results directory.
    #[error("failed to prepare results directory {path}: {source}")]
    ResultsDirectory {
        /// Results directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Description of the expected JSON shape, used in [`ConfigError::ConfigShape`]
/// diagnostics.
const EXPECTED_SHAPE: &str = r#"{
  "propeller_file": "<string>",
  "motor_file": "<string>",
  "timestep_size": <number>,
  "mass_range": [<number>, <number>],
  "arithmetic_precision": <int | null>,
  "takeoff_displacement": <number>,
  "setpoint_parameters": { "velocity", "voltage", "dbeta", "current",
                           "torque", "thrust", "pele", "rpm": <number | null> },
  "aerodynamic_forces": { "fluid_density", "true_airspeed", "drag_coefficient",
                          "reference_area", "acceleration_gravity",
                          "lift_coefficient": <number | null> }
}"#;

#[derive(Debug, Deserialize)]
struct RawSetpoint {
    velocity: Option<f64>,
    voltage: Option<f64>,
    dbeta: Option<f64>,
    current: Option<f64>,
    torque: Option<f64>,
    thrust: Option<f64>,
    pele: Option<f64>,
    rpm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawAero {
    fluid_density: Option<f64>,
    true_airspeed: Option<f64>,
    drag_coefficient: Option<f64>,
    reference_area: Option<f64>,
    acceleration_gravity: Option<f64>,
    lift_coefficient: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    propeller_file: String,
    motor_file: String,
    timestep_size: f64,
    mass_range: (f64, f64),
    arithmetic_precision: Option<u32>,
    takeoff_displacement: f64,
    setpoint_parameters: RawSetpoint,
    aerodynamic_forces: RawAero,
}

/// Operating point vector passed through to the external analyzer at each
/// simulation step. `velocity` is overridden per-step by the simulator;
/// every other field is fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    pub velocity: f64,
    pub voltage: f64,
    pub dbeta: f64,
    pub current: f64,
    pub torque: f64,
    pub thrust: f64,
    pub pele: f64,
    pub rpm: f64,
}

/// Closed-form drag/stall parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeroConfig {
    pub fluid_density: f64,
    /// `None` selects variable-drag mode (drag uses instantaneous velocity).
    pub true_airspeed: Option<f64>,
    pub drag_coefficient: f64,
    pub reference_area: f64,
    pub acceleration_gravity: f64,
    pub lift_coefficient: f64,
}

/// Immutable Run Configuration consumed by every other component.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    /// Derived from the config filename's stem; names the results directory.
    pub identifier: String,
    /// `<identifier>/`, reset and recreated when the configuration loads.
    pub results_directory: PathBuf,
    pub propeller_file: PathBuf,
    pub motor_file: PathBuf,
    pub timestep_size: f64,
    pub mass_range: (f64, f64),
    pub arithmetic_precision: u32,
    pub takeoff_displacement: f64,
    pub setpoint: Setpoint,
    pub aero: AeroConfig,
}

impl RunConfiguration {
    /// `true` when drag should use the instantaneous step velocity rather
    /// than a fixed `true_airspeed`.
    #[inline]
    pub fn variable_drag(&self) -> bool {
        self.aero.true_airspeed.is_none()
    }

    /// The analyzer's external command-line invocation for one step: exactly
    /// ten positional arguments in the order the analyzer binary expects.
    pub fn analyzer_args(&self, velocity: f64) -> [String; 10] {
        [
            self.propeller_file.display().to_string(),
            self.motor_file.display().to_string(),
            velocity.to_string(),
            self.setpoint.rpm.to_string(),
            self.setpoint.voltage.to_string(),
            self.setpoint.dbeta.to_string(),
            self.setpoint.thrust.to_string(),
            self.setpoint.torque.to_string(),
            self.setpoint.current.to_string(),
            self.setpoint.pele.to_string(),
        ]
    }

    /// Drag force at the given instantaneous velocity.
    pub fn drag_force(&self, velocity: f64) -> f64 {
        let u = self.aero.true_airspeed.unwrap_or(velocity);
        0.5 * self.aero.fluid_density * u * u * self.aero.drag_coefficient * self.aero.reference_area
    }

    /// Stall velocity at the given mass.
    pub fn stall_velocity(&self, mass: f64) -> f64 {
        (2.0 * mass * self.aero.acceleration_gravity
            / (self.aero.lift_coefficient * self.aero.fluid_density * self.aero.reference_area))
            .sqrt()
    }

    fn from_raw(raw: RawConfig, identifier: String, results_directory: PathBuf) -> Result<Self, ConfigError> {
        let propeller_file = PathBuf::from(raw.propeller_file);
        if !propeller_file.exists() {
            return Err(ConfigError::ConfigDomain(format!(
                "propeller file \"{}\" not found",
                propeller_file.display()
            )));
        }
        let motor_file = PathBuf::from(raw.motor_file);
        if !motor_file.exists() {
            return Err(ConfigError::ConfigDomain(format!(
                "motor file \"{}\" not found",
                motor_file.display()
            )));
        }

        let mass_range = raw.mass_range;
        if mass_range.0 > mass_range.1 {
            return Err(ConfigError::ConfigDomain(format!(
                "minimum mass_range ({}) cannot exceed maximum ({})",
                mass_range.0, mass_range.1
            )));
        }
        if mass_range.0 <= 0.0 {
            return Err(ConfigError::ConfigDomain(
                "mass_range minimum must be positive".to_string(),
            ));
        }

        let lift_coefficient = raw.aerodynamic_forces.lift_coefficient.unwrap_or(1.0);
        if lift_coefficient == 0.0 {
            return Err(ConfigError::ConfigDomain("lift_coefficient cannot be 0".to_string()));
        }

        let setpoint = Setpoint {
            velocity: raw.setpoint_parameters.velocity.unwrap_or(0.0),
            voltage: raw.setpoint_parameters.voltage.unwrap_or(0.0),
            dbeta: raw.setpoint_parameters.dbeta.unwrap_or(0.0),
            current: raw.setpoint_parameters.current.unwrap_or(0.0),
            torque: raw.setpoint_parameters.torque.unwrap_or(0.0),
            thrust: raw.setpoint_parameters.thrust.unwrap_or(0.0),
            pele: raw.setpoint_parameters.pele.unwrap_or(0.0),
            rpm: raw.setpoint_parameters.rpm.unwrap_or(0.0),
        };

        let aero = AeroConfig {
            fluid_density: raw.aerodynamic_forces.fluid_density.unwrap_or(0.0),
            true_airspeed: raw.aerodynamic_forces.true_airspeed,
            drag_coefficient: raw.aerodynamic_forces.drag_coefficient.unwrap_or(0.0),
            reference_area: raw.aerodynamic_forces.reference_area.unwrap_or(0.0),
            acceleration_gravity: raw.aerodynamic_forces.acceleration_gravity.unwrap_or(9.81),
            lift_coefficient,
        };

        Ok(Self {
            identifier,
            results_directory,
            propeller_file,
            motor_file,
            timestep_size: raw.timestep_size,
            mass_range,
            arithmetic_precision: raw.arithmetic_precision.unwrap_or(0),
            takeoff_displacement: raw.takeoff_displacement,
            setpoint,
            aero,
        })
    }
}

/// Parse and validate a Run Configuration from a JSON file, without
/// touching the results directory. Used by re-exec'd worker processes,
/// which must not reset the directory the parent already prepared.
pub fn parse(config_path: &Path) -> Result<RunConfiguration, ConfigError> {
    let text = fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
        path: config_path.to_path_buf(),
        source,
    })?;

    let raw: RawConfig = serde_json::from_str(&text).map_err(|err| {
        let got = serde_json::from_str::<serde_json::Value>(&text)
            .map(|v| serde_json::to_string_pretty(&v).unwrap_or_default())
            .unwrap_or_else(|_| format!("<invalid JSON: {err}>"));
        ConfigError::ConfigShape {
            path: config_path.to_path_buf(),
            got,
            expected: EXPECTED_SHAPE.to_string(),
        }
    })?;

    let identifier = config_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());

    let results_directory = PathBuf::from(&identifier);

    RunConfiguration::from_raw(raw, identifier, results_directory)
}

/// Load and validate a Run Configuration from a JSON file, resetting its
/// results directory. The one entry point the optimizer's
/// parent process uses; workers use [`parse`] instead.
pub fn load(config_path: &Path) -> Result<RunConfiguration, ConfigError> {
    let config = parse(config_path)?;
    reset_results_directory(&config.results_directory)?;
    Ok(config)
}

fn reset_results_directory(dir: &Path) -> Result<(), ConfigError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| ConfigError::ResultsDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(dir).map_err(|source| ConfigError::ResultsDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    /// `std::env::set_current_dir` is process-global; cargo runs tests in
    /// this module on separate threads of the same process, so any test that
    /// chdirs must hold this lock for the duration of the chdir/restore pair.
    fn cwd_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    /// Load a config by path after chdir-ing into `dir`, restoring the
    /// original working directory before returning. Serialized against the
    /// other tests in this module via [`cwd_lock`].
    fn load_in_dir(dir: &Path, config_name: &str) -> Result<RunConfiguration, ConfigError> {
        let _guard = cwd_lock().lock().unwrap_or_else(|e| e.into_inner());
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = load(&PathBuf::from(config_name));
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    fn minimal_json(prop: &Path, motor: &Path) -> String {
        format!(
            r#"{{
                "propeller_file": "{}",
                "motor_file": "{}",
                "timestep_size": 0.1,
                "mass_range": [1.0, 2.0],
                "arithmetic_precision": 2,
                "takeoff_displacement": 5.0,
                "setpoint_parameters": {{
                    "velocity": 0.1, "voltage": null, "dbeta": null,
                    "current": null, "torque": null, "thrust": null,
                    "pele": null, "rpm": null
                }},
                "aerodynamic_forces": {{
                    "fluid_density": 1.0, "true_airspeed": null,
                    "drag_coefficient": 1.0, "reference_area": 1.0,
                    "acceleration_gravity": null, "lift_coefficient": 2.0
                }}
            }}"#,
            prop.display(),
            motor.display()
        )
    }

    #[test]
    fn loads_valid_config_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let prop = write_config(tmp.path(), "prop.dat", "x");
        let motor = write_config(tmp.path(), "motor.dat", "x");
        write_config(tmp.path(), "mycraft.json", &minimal_json(&prop, &motor));

        let result = load_in_dir(tmp.path(), "mycraft.json");

        let config = result.unwrap();
        assert_eq!(config.identifier, "mycraft");
        assert_eq!(config.setpoint.voltage, 0.0);
        assert_eq!(config.aero.acceleration_gravity, 9.81);
        assert!(!config.variable_drag());
    }

    #[test]
    fn rejects_zero_lift_coefficient() {
        let tmp = tempfile::tempdir().unwrap();
        let prop = write_config(tmp.path(), "prop.dat", "x");
        let motor = write_config(tmp.path(), "motor.dat", "x");
        let body = minimal_json(&prop, &motor).replace("\"lift_coefficient\": 2.0", "\"lift_coefficient\": 0.0");
        let config_path = write_config(tmp.path(), "mycraft.json", &body);

        let result = load_in_dir(tmp.path(), config_path.file_name().unwrap().to_str().unwrap());

        assert!(matches!(result, Err(ConfigError::ConfigDomain(_))));
    }

    #[test]
    fn rejects_inverted_mass_range() {
        let tmp = tempfile::tempdir().unwrap();
        let prop = write_config(tmp.path(), "prop.dat", "x");
        let motor = write_config(tmp.path(), "motor.dat", "x");
        let body = minimal_json(&prop, &motor).replace("\"mass_range\": [1.0, 2.0]", "\"mass_range\": [2.0, 1.0]");
        let config_path = write_config(tmp.path(), "mycraft.json", &body);

        let result = load_in_dir(tmp.path(), config_path.file_name().unwrap().to_str().unwrap());

        assert!(matches!(result, Err(ConfigError::ConfigDomain(_))));
    }

    #[test]
    fn rejects_malformed_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = write_config(tmp.path(), "bad.json", r#"{"propeller_file": 5}"#);

        let result = load(&config_path);
        assert!(matches!(result, Err(ConfigError::ConfigShape { .. })));
    }

    #[test]
    fn variable_drag_uses_instantaneous_velocity() {
        let tmp = tempfile::tempdir().unwrap();
        let prop = write_config(tmp.path(), "prop.dat", "x");
        let motor = write_config(tmp.path(), "motor.dat", "x");
        let config_path = write_config(tmp.path(), "mycraft.json", &minimal_json(&prop, &motor));

        let config = load_in_dir(tmp.path(), config_path.file_name().unwrap().to_str().unwrap()).unwrap();

        assert!(config.variable_drag());
        assert_eq!(config.drag_force(2.0), 0.5 * 1.0 * 4.0 * 1.0 * 1.0);
    }
}
