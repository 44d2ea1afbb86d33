//! Parallel sweep over a parameter grid.
//!
//! Each grid point runs an independent backtest over the same shared bars.
//! Runs never share mutable state, so the fan-out is a plain `par_iter`.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::{BacktestResult, BacktestRunner, StrategyConfig};
use crate::data::{validate_bars, PriceBar};
use crate::metrics::BacktestSummary;

use super::grid::{ParameterGrid, ParameterSet};

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub params: ParameterSet,
    pub summary: BacktestSummary,
    pub skipped_entries: usize,
}

/// Run every valid grid point and rank by total P&L, best first.
///
/// Ties keep grid order. `progress` is called with `(done, total)` after each
/// grid point completes, from whichever worker thread finished it.
pub fn run_sweep(
    bars: &[PriceBar],
    base: &StrategyConfig,
    grid: &ParameterGrid,
    progress: &(dyn Fn(usize, usize) + Sync),
) -> BacktestResult<Vec<SweepResult>> {
    base.validate()?;
    validate_bars(bars)?;

    let combinations = grid.combinations(base);
    let total = combinations.len();
    info!(
        "Sweeping {} of {} parameter combinations over {} bars",
        total,
        grid.total_combinations(),
        bars.len()
    );

    let done = AtomicUsize::new(0);
    let mut results = combinations
        .par_iter()
        .map(|params| -> BacktestResult<SweepResult> {
            let runner = BacktestRunner::new(params.apply_to(base));
            let report = runner.run_report(bars)?;

            let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress(completed, total);
            if completed % (total / 10).max(1) == 0 || completed == total {
                info!(
                    "Sweep {:.0}% ({}/{} combinations)",
                    completed as f64 / total as f64 * 100.0,
                    completed,
                    total
                );
            }

            Ok(SweepResult {
                params: params.clone(),
                summary: report.summary,
                skipped_entries: report.skipped_entries,
            })
        })
        .collect::<BacktestResult<Vec<_>>>()?;

    // Stable sort on an order-preserving collect keeps ties in grid order.
    results.sort_by(|a, b| b.summary.total_pnl.total_cmp(&a.summary.total_pnl));

    if let Some(best) = results.first() {
        info!(
            "Best parameters: {} (total P&L ${:.2}, {} trades)",
            best.params.key(),
            best.summary.total_pnl,
            best.summary.total_trades
        );
    }

    Ok(results)
}
