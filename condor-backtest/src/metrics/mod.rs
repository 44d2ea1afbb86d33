//! Performance metrics module.
//!
//! Reduces completed trades to:
//! - Win rate, total and average P&L
//! - Profit factor and a per-trade Sharpe ratio
//! - Exit-reason histogram, drawdown, monthly P&L

pub mod calculator;

pub use calculator::{BacktestSummary, MonthlyPnl, PerformanceAggregator, TradeStatistics};
