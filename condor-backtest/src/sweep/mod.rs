//! Parameter sweeps.
//!
//! Expands a grid of strategy parameters and backtests every point in
//! parallel against one bar series.

pub mod grid;
pub mod runner;

pub use grid::{ParameterGrid, ParameterSet};
pub use runner::{run_sweep, SweepResult};
