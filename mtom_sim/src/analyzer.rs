//! External Analyzer Interface: the stateless collaborator that turns one
//! operating point into one thrust/current/etc. sample.
//!
//! `ThrustSource` is a trait-at-the-seam that keeps a real subprocess
//! swappable for a test double — unit tests inject a synthetic analyzer with
//! a closed-form thrust curve instead of invoking `qprop`.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use mtom_common::consts::{
    ANALYZER_BINARY, ANALYZER_HEADER_LINES, COL_CURRENT, COL_FREESTREAM, COL_RPM, COL_THRUST,
    COL_TORQUE, COL_VOLTAGE, MIN_DATA_ROW_COLUMNS,
};
use mtom_common::RunConfiguration;

use crate::error::AnalyzerError;

/// The first-row sample the analyzer returns for one step:
/// `(freestream, rpm, thrust, torque, voltage, current)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRow {
    pub freestream: f64,
    pub rpm: f64,
    pub thrust: f64,
    pub torque: f64,
    pub voltage: f64,
    pub current: f64,
}

/// Stateless collaborator: given a configuration and a velocity, produce one
/// thrust sample. Implemented by [`QpropAnalyzer`] for real runs and by test
/// doubles for property/unit tests.
pub trait ThrustSource {
    fn analyze(&self, config: &RunConfiguration, velocity: f64) -> Result<SampleRow, AnalyzerError>;
}

/// Invokes the real external analyzer subprocess (`qprop` by default).
pub struct QpropAnalyzer {
    binary: String,
    timeout: Option<Duration>,
}

impl QpropAnalyzer {
    /// Use the default analyzer binary name with no per-step timeout.
    pub fn new() -> Self {
        Self {
            binary: ANALYZER_BINARY.to_string(),
            timeout: None,
        }
    }

    /// Override the analyzer binary (useful for tests pointing at a stub script).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Add a per-step deadline. A hung analyzer is killed and surfaced as
    /// `AnalyzerError::Timeout` rather than hanging the worker forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for QpropAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrustSource for QpropAnalyzer {
    fn analyze(&self, config: &RunConfiguration, velocity: f64) -> Result<SampleRow, AnalyzerError> {
        let args = config.analyzer_args(velocity);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AnalyzerError::Spawn { source })?;

        let status = match self.timeout {
            Some(deadline) => wait_with_deadline(&mut child, deadline)?,
            None => child.wait().map_err(|source| AnalyzerError::Spawn { source })?,
        };

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).ok();
        }
        let mut stderr = String::new();
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr).ok();
        }

        if !status.success() {
            return Err(AnalyzerError::AnalyzerFailure {
                exit_code: status.code(),
                stderr,
            });
        }

        parse_first_data_row(&stdout)
    }
}

fn wait_with_deadline(
    child: &mut std::process::Child,
    deadline: Duration,
) -> Result<std::process::ExitStatus, AnalyzerError> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|source| AnalyzerError::Spawn { source })? {
            return Ok(status);
        }
        if start.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AnalyzerError::Timeout {
                elapsed_ms: start.elapsed().as_millis(),
            });
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Parse the first whitespace-separated data row after the fixed header.
fn parse_first_data_row(stdout: &str) -> Result<SampleRow, AnalyzerError> {
    let data_line = stdout
        .lines()
        .skip(ANALYZER_HEADER_LINES)
        .find(|line| !line.trim().is_empty())
        .ok_or(AnalyzerError::AnalyzerEmpty {
            header_lines: ANALYZER_HEADER_LINES,
        })?;

    let columns: Vec<&str> = data_line.split_whitespace().collect();
    if columns.len() < MIN_DATA_ROW_COLUMNS {
        return Err(AnalyzerError::AnalyzerMalformed {
            reason: format!(
                "expected at least {MIN_DATA_ROW_COLUMNS} columns, found {}",
                columns.len()
            ),
        });
    }

    let parse = |idx: usize| -> Result<f64, AnalyzerError> {
        columns[idx]
            .parse::<f64>()
            .map_err(|e| AnalyzerError::AnalyzerMalformed {
                reason: format!("column {idx} (\"{}\") not numeric: {e}", columns[idx]),
            })
    };

    Ok(SampleRow {
        freestream: parse(COL_FREESTREAM)?,
        rpm: parse(COL_RPM)?,
        thrust: parse(COL_THRUST)?,
        torque: parse(COL_TORQUE)?,
        voltage: parse(COL_VOLTAGE)?,
        current: parse(COL_CURRENT)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(n: usize) -> String {
        (0..n).map(|i| format!("header line {i}\n")).collect()
    }

    #[test]
    fn parses_valid_row_after_header() {
        let mut out = header(ANALYZER_HEADER_LINES);
        out.push_str("10.0 5000.0 0.1 12.0 20.0 5.0 3.0 1.5\n");
        let row = parse_first_data_row(&out).unwrap();
        assert_eq!(row.freestream, 10.0);
        assert_eq!(row.rpm, 5000.0);
        assert_eq!(row.thrust, 12.0);
        assert_eq!(row.torque, 20.0);
        assert_eq!(row.voltage, 3.0);
        assert_eq!(row.current, 1.5);
    }

    #[test]
    fn empty_after_header_is_analyzer_empty() {
        let out = header(ANALYZER_HEADER_LINES);
        assert!(matches!(
            parse_first_data_row(&out),
            Err(AnalyzerError::AnalyzerEmpty { .. })
        ));
    }

    #[test]
    fn short_row_is_malformed() {
        let mut out = header(ANALYZER_HEADER_LINES);
        out.push_str("1.0 2.0 3.0\n");
        assert!(matches!(
            parse_first_data_row(&out),
            Err(AnalyzerError::AnalyzerMalformed { .. })
        ));
    }

    #[test]
    fn non_numeric_column_is_malformed() {
        let mut out = header(ANALYZER_HEADER_LINES);
        out.push_str("1.0 2.0 3.0 notanumber 5.0 6.0 7.0 8.0\n");
        assert!(matches!(
            parse_first_data_row(&out),
            Err(AnalyzerError::AnalyzerMalformed { .. })
        ));
    }
}
