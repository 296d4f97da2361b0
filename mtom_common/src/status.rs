//! Per-worker state machine and optimizer-level terminal outcomes.
//!
//! `ProcessStatus` plays both roles: the live state a worker publishes to
//! its telemetry cell while it runs, and the terminal classification the
//! optimizer reads after `join`. The *ordering* of the variants is
//! load-bearing: the optimizer classifies any final status whose
//! discriminant is greater than [`ProcessStatus::SuccessTakeoff`] as a failure.

use serde::{Deserialize, Serialize};

/// Live state and terminal classification of a single dynamics-simulation worker.
///
/// Only one `ProcessStatus` is active per worker at any time. A worker's
/// lifecycle runs `OptimizerSetup -> ForkingProcess` once, then cycles
/// `ExecutingQprop -> ExtractingData -> IteratingState -> UpdatingCounts ->
/// CheckingLimits -> ExecutingQprop` until `CheckingLimits` resolves to one
/// of the three terminal variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProcessStatus {
    /// Worker process has not yet been forked.
    OptimizerSetup = 0,
    /// Worker process forked, about to bind its telemetry cell.
    ForkingProcess = 1,
    /// Invoking the external analyzer for the current velocity.
    ExecutingQprop = 2,
    /// Parsing the analyzer's stdout into a sample row.
    ExtractingData = 3,
    /// Integrating one semi-implicit Euler step.
    IteratingState = 4,
    /// Publishing the new (t, x, v, a, T, D) tuple to the telemetry cell.
    UpdatingCounts = 5,
    /// Evaluating terminal conditions against the new state.
    CheckingLimits = 6,
    /// Lift-off achieved above stall velocity. Terminal, success.
    SuccessTakeoff = 7,
    /// Lift-off displacement covered, but below stall velocity. Terminal, failure.
    FailedVelocity = 8,
    /// The external analyzer failed or produced unparsable output. Terminal, failure.
    AnalyzerError = 9,
}

impl ProcessStatus {
    /// Convert from a raw `u8` as published in a telemetry cell. `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::OptimizerSetup),
            1 => Some(Self::ForkingProcess),
            2 => Some(Self::ExecutingQprop),
            3 => Some(Self::ExtractingData),
            4 => Some(Self::IteratingState),
            5 => Some(Self::UpdatingCounts),
            6 => Some(Self::CheckingLimits),
            7 => Some(Self::SuccessTakeoff),
            8 => Some(Self::FailedVelocity),
            9 => Some(Self::AnalyzerError),
            _ => None,
        }
    }

    /// True for any of the three states a worker stops cycling in.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SuccessTakeoff | Self::FailedVelocity | Self::AnalyzerError
        )
    }

    /// The classification the optimizer's bracket-update logic reads: a
    /// final status whose integer value is strictly greater than
    /// `SuccessTakeoff`'s is a failing mass.
    #[inline]
    pub const fn is_failure(self) -> bool {
        (self as u8) > (Self::SuccessTakeoff as u8)
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self::OptimizerSetup
    }
}

/// Optimizer-level terminal outcome of one `MtomOptimizer::run` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultState {
    /// Converged: the mass bracket closed to within `arithmetic_precision`.
    MtomFound {
        /// The converged mass, `G[0]` of the final epoch.
        mass: f64,
    },
    /// The configured lower mass bound already fails; MTOM is outside the
    /// configured search range on the low side.
    MassLowerboundBeyondMtom,
    /// The configured upper mass bound still succeeds; MTOM is outside the
    /// configured search range on the high side. Reports the best success seen.
    MassUpperboundBelowMtom {
        /// The largest mass observed to succeed, `G[m*_a]` of the final epoch.
        mass: f64,
    },
}
