//! Error taxonomy for the External Analyzer Interface and Dynamics Simulator.

use thiserror::Error;

/// Failure modes of one analyzer invocation. All are fatal to the worker
/// that hit them — the simulator never retries a step, it ends the run with
/// `ProcessStatus::AnalyzerError`.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The analyzer subprocess could not be spawned at all.
    #[error("failed to spawn analyzer process: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    /// The analyzer subprocess exited with a non-zero status.
    #[error("analyzer exited with status {exit_code:?}: {stderr}")]
    AnalyzerFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The analyzer's invocation exceeded the configured per-step deadline.
    #[error("analyzer invocation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u128 },

    /// The analyzer produced output, but it contained no data row after the header.
    #[error("analyzer output had no data rows after {header_lines} header lines")]
    AnalyzerEmpty { header_lines: usize },

    /// The first data row could not be parsed into the expected columns.
    #[error("analyzer data row malformed: {reason}")]
    AnalyzerMalformed { reason: String },
}
