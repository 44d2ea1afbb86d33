//! Parameter grid for strategy sweeps.

use serde::{Deserialize, Serialize};

use crate::backtest::StrategyConfig;

/// Parameter values to sweep. Each list replaces one field of a base config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    /// Short strike |delta| values.
    pub short_delta: Vec<f64>,
    /// Wing widths in points.
    pub wing_width: Vec<f64>,
    /// Profit targets as a fraction of credit.
    pub profit_target_pct: Vec<f64>,
    /// Stop losses as a multiple of credit.
    pub stop_loss_pct: Vec<f64>,
    /// Time-exit thresholds in days.
    pub max_dte: Vec<i64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            short_delta: vec![0.10, 0.16, 0.20, 0.25],
            wing_width: vec![5.0, 10.0],
            profit_target_pct: vec![0.25, 0.50, 0.75],
            stop_loss_pct: vec![1.0, 1.5, 2.0, 3.0],
            max_dte: vec![0, 7, 21],
        }
    }
}

impl ParameterGrid {
    /// Number of raw combinations, before invalid ones are dropped.
    pub fn total_combinations(&self) -> usize {
        self.short_delta.len()
            * self.wing_width.len()
            * self.profit_target_pct.len()
            * self.stop_loss_pct.len()
            * self.max_dte.len()
    }

    /// Every combination that yields a valid config on top of `base`, in
    /// grid order.
    pub fn combinations(&self, base: &StrategyConfig) -> Vec<ParameterSet> {
        let mut combos = Vec::new();

        for &short_delta in &self.short_delta {
            for &wing_width in &self.wing_width {
                for &profit_target_pct in &self.profit_target_pct {
                    for &stop_loss_pct in &self.stop_loss_pct {
                        for &max_dte in &self.max_dte {
                            let params = ParameterSet {
                                short_delta,
                                wing_width,
                                profit_target_pct,
                                stop_loss_pct,
                                max_dte,
                            };
                            if params.apply_to(base).validate().is_ok() {
                                combos.push(params);
                            }
                        }
                    }
                }
            }
        }

        combos
    }
}

/// A single point of the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub short_delta: f64,
    pub wing_width: f64,
    pub profit_target_pct: f64,
    pub stop_loss_pct: f64,
    pub max_dte: i64,
}

impl ParameterSet {
    /// Copy of `base` with this set's values.
    pub fn apply_to(&self, base: &StrategyConfig) -> StrategyConfig {
        StrategyConfig {
            short_delta: self.short_delta,
            wing_width: self.wing_width,
            profit_target_pct: self.profit_target_pct,
            stop_loss_pct: self.stop_loss_pct,
            max_dte: self.max_dte,
            ..base.clone()
        }
    }

    /// Short label for logs and tables.
    pub fn key(&self) -> String {
        format!(
            "d{:.2}_w{}_pt{:.0}_sl{:.0}_x{}",
            self.short_delta,
            self.wing_width,
            self.profit_target_pct * 100.0,
            self.stop_loss_pct * 100.0,
            self.max_dte
        )
    }
}
