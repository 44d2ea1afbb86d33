//! Option pricing primitives.
//!
//! - Black-Scholes price and delta for European puts and calls
//! - Strike selection by delta (bisection over strike)

pub mod black_scholes;
pub mod strike_solver;

pub use black_scholes::BlackScholes;
pub use strike_solver::{ConvergenceError, StrikeSolver};
