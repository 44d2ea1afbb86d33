//! Volatility estimation for option pricing.
//!
//! Realized close-to-close volatility stands in for implied volatility, which
//! is not available from bar data. The estimate is an approximation; it will
//! differ from quoted IV and is not meant to reproduce it.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::data::PriceBar;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Produces the annualized volatility used to price a trade at entry.
pub trait VolatilityEstimator {
    /// Estimate volatility from bars ending at the entry bar (inclusive).
    fn estimate(&self, bars: &[PriceBar]) -> f64;
}

/// Realized volatility of trailing log returns, clamped to a sane range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalVolatility {
    /// Number of trailing returns to use.
    pub lookback: usize,
    /// Returned when fewer than two bars are available.
    pub default_vol: f64,
    /// Lower clamp.
    pub min_vol: f64,
    /// Upper clamp.
    pub max_vol: f64,
}

impl Default for HistoricalVolatility {
    fn default() -> Self {
        Self {
            lookback: 20,
            default_vol: 0.18,
            min_vol: 0.05,
            max_vol: 0.80,
        }
    }
}

impl HistoricalVolatility {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            ..Default::default()
        }
    }

    /// Log returns over the trailing window (`lookback + 1` closes).
    fn trailing_log_returns(&self, bars: &[PriceBar]) -> Vec<f64> {
        let window = self.lookback.saturating_add(1).min(bars.len());
        bars[bars.len() - window..]
            .windows(2)
            .map(|w| (w[1].close_f64() / w[0].close_f64()).ln())
            .filter(|r| r.is_finite())
            .collect()
    }
}

impl VolatilityEstimator for HistoricalVolatility {
    fn estimate(&self, bars: &[PriceBar]) -> f64 {
        if bars.len() < 2 {
            return self.default_vol;
        }

        let returns = self.trailing_log_returns(bars);
        if returns.is_empty() {
            return self.default_vol;
        }

        let annualized = returns.iter().population_std_dev() * TRADING_DAYS_PER_YEAR.sqrt();
        if annualized.is_nan() {
            return self.default_vol;
        }
        annualized.clamp(self.min_vol, self.max_vol)
    }
}

/// Constant volatility, for deterministic tests and what-if runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedVolatility(pub f64);

impl VolatilityEstimator for FixedVolatility {
    fn estimate(&self, _bars: &[PriceBar]) -> f64 {
        self.0
    }
}

impl<T: VolatilityEstimator + ?Sized> VolatilityEstimator for &T {
    fn estimate(&self, bars: &[PriceBar]) -> f64 {
        (**self).estimate(bars)
    }
}
