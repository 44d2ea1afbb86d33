//! Iron condor backtesting engine.
//!
//! This module provides the simulation side of the crate:
//! - Strategy configuration and its invariants
//! - Listed expiration calendars for entry cadence
//! - Position lifecycle (entry, repricing, exit rules)
//! - The runner that walks a bar series one position at a time

pub mod config;
pub mod engine;
pub mod error;
pub mod expiration;
pub mod simulator;
pub mod trade;

pub use config::{ConfigError, StrategyConfig};
pub use engine::{BacktestReport, BacktestRunner};
pub use error::{BacktestError, BacktestResult};
pub use expiration::ExpirationCycle;
pub use simulator::{PositionSimulator, StepOutcome, DAYS_PER_YEAR};
pub use trade::{
    CondorPosition, ExitReason, LegSide, OptionLeg, TradeResult, CONTRACT_MULTIPLIER,
};
