//! Core backtesting loop.
//!
//! Runs the simulation over a bar series:
//! 1. Validate config and bars
//! 2. Find the next bar with a listed expiration inside the entry window
//! 3. Open a condor (skip the date on a recoverable failure)
//! 4. Step the position bar by bar until an exit rule fires
//! 5. Resume entry search on the bar after the exit
//!
//! Exactly one position is open at a time. A position still open when the
//! series ends is settled at intrinsic value against the final bar.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analytics::{HistoricalVolatility, VolatilityEstimator};
use crate::data::{validate_bars, PriceBar};
use crate::metrics::{BacktestSummary, PerformanceAggregator};

use super::config::StrategyConfig;
use super::error::BacktestResult;
use super::simulator::{PositionSimulator, StepOutcome};
use super::trade::{CondorPosition, TradeResult};

/// Results of one run with its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: StrategyConfig,
    pub summary: BacktestSummary,
    /// Entry attempts skipped on solver or credit failures.
    pub skipped_entries: usize,
    pub trades: Vec<TradeResult>,
}

/// Walks a bar series entering and managing one condor at a time.
pub struct BacktestRunner<V: VolatilityEstimator = HistoricalVolatility> {
    config: StrategyConfig,
    estimator: V,
}

impl BacktestRunner<HistoricalVolatility> {
    /// Runner using the realized-volatility settings in `config`.
    pub fn new(config: StrategyConfig) -> Self {
        let estimator = config.volatility.clone();
        Self { config, estimator }
    }
}

impl<V: VolatilityEstimator> BacktestRunner<V> {
    pub fn with_estimator(config: StrategyConfig, estimator: V) -> Self {
        Self { config, estimator }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Run the backtest and return every completed trade in entry order.
    pub fn run(&self, bars: &[PriceBar]) -> BacktestResult<Vec<TradeResult>> {
        self.simulate(bars).map(|(trades, _)| trades)
    }

    /// Run the backtest and summarize it.
    pub fn run_report(&self, bars: &[PriceBar]) -> BacktestResult<BacktestReport> {
        let (trades, skipped_entries) = self.simulate(bars)?;
        Ok(BacktestReport {
            config: self.config.clone(),
            summary: PerformanceAggregator::summarize(&trades),
            skipped_entries,
            trades,
        })
    }

    fn simulate(&self, bars: &[PriceBar]) -> BacktestResult<(Vec<TradeResult>, usize)> {
        self.config.validate()?;
        validate_bars(bars)?;

        let config = &self.config;
        let simulator = PositionSimulator::new(config, &self.estimator);
        let mut trades = Vec::new();
        let mut skipped = 0;

        // No entry on the final bar: there would be nothing to step through.
        let mut i = 0;
        while i + 1 < bars.len() {
            let bar = &bars[i];
            let listed = config
                .expiration_cycle
                .expiration_for(bar.date, config.dte_min, config.dte_max);
            let Some(expiration) = listed else {
                i += 1;
                continue;
            };

            match simulator.open_position(bar.date, expiration, &bars[..=i]) {
                Ok(position) => {
                    let (trade, exit_index) = Self::manage(&simulator, position, bars, i);
                    trades.push(trade);
                    i = exit_index + 1;
                }
                Err(e) if e.is_recoverable() => {
                    debug!("Skipping entry on {}: {}", bar.date, e);
                    skipped += 1;
                    i += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        if trades.is_empty() {
            warn!(
                "Backtest {} produced no trades over {} bars ({} entries skipped)",
                config.underlying_symbol,
                bars.len(),
                skipped
            );
        } else {
            info!(
                "Backtest {} complete: {} trades, {} entries skipped, total P&L ${:.2}",
                config.underlying_symbol,
                trades.len(),
                skipped,
                total_pnl
            );
        }

        Ok((trades, skipped))
    }

    /// Step a freshly opened position until it closes. Returns the trade and
    /// the index of the exit bar.
    fn manage(
        simulator: &PositionSimulator<'_, V>,
        position: CondorPosition,
        bars: &[PriceBar],
        entry_index: usize,
    ) -> (TradeResult, usize) {
        let expiration = position.expiration;
        let mut position = position;

        for (j, bar) in bars.iter().enumerate().skip(entry_index + 1) {
            let days_remaining = (expiration - bar.date).num_days();
            position = match simulator.step(position, bar, days_remaining) {
                StepOutcome::Open(open) => open,
                StepOutcome::Closed(trade) => return (trade, j),
            };
        }

        // Entries never happen on the last bar, so `bars` has a final bar here.
        let last_index = bars.len() - 1;
        let last = &bars[last_index];
        let days_remaining = (expiration - last.date).num_days();
        (simulator.settle(position, last, days_remaining), last_index)
    }
}
