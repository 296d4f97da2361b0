//! Workspace-wide constants for the external analyzer invocation and output
//! parsing contract.

/// Name of the external propeller/motor analysis binary.
pub const ANALYZER_BINARY: &str = "qprop";

/// Number of preamble lines the analyzer emits before the first data row.
pub const ANALYZER_HEADER_LINES: usize = 17;

/// Column index of the freestream velocity in an analyzer data row.
pub const COL_FREESTREAM: usize = 0;
/// Column index of the propeller RPM in an analyzer data row.
pub const COL_RPM: usize = 1;
/// Column index of thrust in an analyzer data row.
pub const COL_THRUST: usize = 3;
/// Column index of torque in an analyzer data row.
pub const COL_TORQUE: usize = 4;
/// Column index of voltage in an analyzer data row.
pub const COL_VOLTAGE: usize = 6;
/// Column index of current in an analyzer data row.
pub const COL_CURRENT: usize = 7;

/// Minimum number of whitespace-separated columns a data row must have for
/// every consumed index above to be in range.
pub const MIN_DATA_ROW_COLUMNS: usize = COL_CURRENT + 1;

/// Number of decimal digits used when formatting a mass for the persisted
/// trace filename.
pub const MASS_FILENAME_DECIMALS: usize = 16;

/// Lower clamp on worker/process count.
pub const MIN_PROCESSES: usize = 3;
