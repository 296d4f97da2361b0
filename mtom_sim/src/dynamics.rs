//! Dynamics Simulator: the per-worker time-stepped takeoff simulation.
//! Integrates with a semi-implicit Euler step and runs until exactly one
//! terminal condition fires.

use serde::{Deserialize, Serialize};

use mtom_common::{ProcessStatus, RunConfiguration};
use mtom_telemetry::WtcWriter;

use crate::analyzer::ThrustSource;

/// A complete per-worker simulation trace: six parallel, lockstep sequences.
/// `t`, `x`, `v` include the initial state at index 0; `a`, `thrust`, `drag`
/// are one step behind (no value exists before the first step is taken).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationTrace {
    pub t: Vec<f64>,
    pub x: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
    pub thrust: Vec<f64>,
    pub drag: Vec<f64>,
}

impl SimulationTrace {
    fn new(initial_velocity: f64) -> Self {
        Self {
            t: vec![0.0],
            x: vec![0.0],
            v: vec![initial_velocity],
            a: Vec::new(),
            thrust: Vec::new(),
            drag: Vec::new(),
        }
    }

    /// `x.last()`, the actual lift-off/termination displacement — used by
    /// the final summary and `PrecisionWarning` check.
    pub fn final_position(&self) -> f64 {
        *self.x.last().expect("trace always has an initial position")
    }

    pub fn final_velocity(&self) -> f64 {
        *self.v.last().expect("trace always has an initial velocity")
    }

    /// The position one step before termination. Comparing this against
    /// `takeoff_displacement` tells the caller how far the final step
    /// overshot it — a large overshoot means `timestep_size` is too coarse.
    pub fn position_before_terminal(&self) -> Option<f64> {
        self.x.len().checked_sub(2).map(|i| self.x[i])
    }
}

/// Run one worker's simulation to a terminal condition, publishing live
/// state to its telemetry cell at every step. Returns the final status and
/// the complete trace.
pub fn simulate<A: ThrustSource>(
    config: &RunConfiguration,
    mass: f64,
    analyzer: &A,
    writer: &WtcWriter,
) -> (ProcessStatus, SimulationTrace) {
    let mut trace = SimulationTrace::new(config.setpoint.velocity);
    writer.set_mass(mass);

    loop {
        writer.publish_status(ProcessStatus::ExecutingQprop);
        let current_velocity = *trace.v.last().unwrap();
        let sample = match analyzer.analyze(config, current_velocity) {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(mass, error = %err, "analyzer failed, terminating worker");
                writer.publish_status(ProcessStatus::AnalyzerError);
                return (ProcessStatus::AnalyzerError, trace);
            }
        };

        writer.publish_status(ProcessStatus::ExtractingData);
        let thrust = sample.thrust;
        let drag = config.drag_force(current_velocity);

        writer.publish_status(ProcessStatus::IteratingState);
        let acceleration = (thrust - drag) / mass;
        let v_new = current_velocity + acceleration * config.timestep_size;
        let x_new = trace.x.last().unwrap() + v_new * config.timestep_size;
        let t_new = trace.t.last().unwrap() + config.timestep_size;

        trace.a.push(acceleration);
        trace.thrust.push(thrust);
        trace.drag.push(drag);
        trace.v.push(v_new);
        trace.x.push(x_new);
        trace.t.push(t_new);

        writer.publish_status(ProcessStatus::UpdatingCounts);
        writer.publish_step(t_new, x_new, v_new, acceleration, thrust, drag);

        writer.publish_status(ProcessStatus::CheckingLimits);
        if x_new > config.takeoff_displacement {
            let stall_velocity = config.stall_velocity(mass);
            let final_status = if v_new > stall_velocity {
                ProcessStatus::SuccessTakeoff
            } else {
                ProcessStatus::FailedVelocity
            };
            writer.publish_status(final_status);
            return (final_status, trace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SampleRow;
    use mtom_common::{AeroConfig, Setpoint};
    use mtom_telemetry::TelemetrySegment;

    struct ConstantThrust(f64);

    impl ThrustSource for ConstantThrust {
        fn analyze(
            &self,
            _config: &RunConfiguration,
            velocity: f64,
        ) -> Result<SampleRow, crate::error::AnalyzerError> {
            Ok(SampleRow {
                freestream: velocity,
                rpm: 0.0,
                thrust: self.0,
                torque: 0.0,
                voltage: 0.0,
                current: 0.0,
            })
        }
    }

    fn test_config() -> RunConfiguration {
        RunConfiguration {
            identifier: "test".into(),
            results_directory: std::env::temp_dir(),
            propeller_file: std::env::temp_dir(),
            motor_file: std::env::temp_dir(),
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
                drag_coefficient: 0.0,
                reference_area: 1.0,
                acceleration_gravity: 9.81,
                lift_coefficient: 2.0,
            },
        }
    }

    fn test_writer(name: &str) -> (TelemetrySegment, WtcWriter) {
        let segment = TelemetrySegment::create(name, 1).unwrap();
        let writer = WtcWriter::attach(segment.path(), 1, 0).unwrap();
        (segment, writer)
    }

    #[test]
    fn semi_implicit_euler_matches_closed_form() {
        let config = test_config();
        let (segment, writer) = test_writer("dyn_euler");
        let analyzer = ConstantThrust(50.0);
        let (status, trace) = simulate(&config, 1.0, &analyzer, &writer);

        // drag is zero (fixed true_airspeed, drag_coefficient 0), so a = T/m constant.
        let expected_a = 50.0 / 1.0;
        let expected_v1 = config.setpoint.velocity + expected_a * config.timestep_size;
        let expected_x1 = 0.0 + expected_v1 * config.timestep_size;

        assert!((trace.a[0] - expected_a).abs() < 1e-12);
        assert!((trace.v[1] - expected_v1).abs() < 1e-12);
        assert!((trace.x[1] - expected_x1).abs() < 1e-12);
        assert!(matches!(
            status,
            ProcessStatus::SuccessTakeoff | ProcessStatus::FailedVelocity
        ));

        std::fs::remove_file(segment.path()).ok();
    }

    #[test]
    fn trace_is_monotone_when_thrust_exceeds_drag() {
        let config = test_config();
        let (segment, writer) = test_writer("dyn_monotone");
        let analyzer = ConstantThrust(50.0);
        let (_, trace) = simulate(&config, 1.0, &analyzer, &writer);

        for w in trace.t.windows(2) {
            assert!(w[1] > w[0]);
        }
        for w in trace.x.windows(2) {
            assert!(w[1] > w[0]);
        }
        for &v in &trace.v {
            assert!(v > 0.0);
        }

        std::fs::remove_file(segment.path()).ok();
    }

    #[test]
    fn analyzer_failure_terminates_with_analyzer_error() {
        struct AlwaysFails;
        impl ThrustSource for AlwaysFails {
            fn analyze(
                &self,
                _config: &RunConfiguration,
                _velocity: f64,
            ) -> Result<SampleRow, crate::error::AnalyzerError> {
                Err(crate::error::AnalyzerError::AnalyzerEmpty { header_lines: 17 })
            }
        }

        let config = test_config();
        let (segment, writer) = test_writer("dyn_fail");
        let (status, trace) = simulate(&config, 1.0, &AlwaysFails, &writer);

        assert_eq!(status, ProcessStatus::AnalyzerError);
        assert!(status.is_failure());
        assert_eq!(trace.a.len(), 0);

        std::fs::remove_file(segment.path()).ok();
    }

    #[test]
    fn low_thrust_fails_on_velocity_not_on_displacement() {
        let config = test_config();
        let (segment, writer) = test_writer("dyn_lowthrust");
        // Thrust barely above zero drag but mass large enough that stall
        // velocity is never exceeded before crossing takeoff_displacement.
        let analyzer = ConstantThrust(0.05);
        let (status, _trace) = simulate(&config, 100.0, &analyzer, &writer);

        assert_eq!(status, ProcessStatus::FailedVelocity);
        assert!(status.is_failure());

        std::fs::remove_file(segment.path()).ok();
    }
}
