//! External Analyzer Interface and Dynamics Simulator.

pub mod analyzer;
pub mod dynamics;
pub mod error;

pub use analyzer::{QpropAnalyzer, SampleRow, ThrustSource};
pub use dynamics::{simulate, SimulationTrace};
pub use error::AnalyzerError;
