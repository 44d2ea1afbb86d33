//! Performance aggregation over completed trades.
//!
//! Undefined statistics are explicit rather than zero:
//! - `win_rate`, `avg_pnl` and `profit_factor` are `None` with no trades
//! - `profit_factor` is `+inf` with winners and no losers
//! - `sharpe_ratio` is `None` when P&L has no dispersion

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::backtest::{ExitReason, TradeResult};

/// Headline statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_trades: usize,
    /// Trades with P&L above zero.
    pub wins: usize,
    /// Trades with P&L at or below zero.
    pub losses: usize,
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub avg_pnl: Option<f64>,
    /// Gross profit over gross loss. Serialized as `"inf"` when there are no losses.
    #[serde(with = "infinite_ratio")]
    pub profit_factor: Option<f64>,
    /// Mean P&L over its population standard deviation, per trade.
    pub sharpe_ratio: Option<f64>,
    /// Count per exit reason; every reason is present.
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    /// First entry date.
    pub start_date: Option<NaiveDate>,
    /// Last exit date.
    pub end_date: Option<NaiveDate>,
}

impl BacktestSummary {
    /// Generate a summary report.
    pub fn report(&self) -> String {
        let period = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            _ => "no trades".to_string(),
        };
        let exits = self
            .exit_reasons
            .iter()
            .map(|(reason, count)| format!("  {}: {}", reason, count))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Backtest Summary ({})\n\
             ========================================\n\
             Trades: {} (W: {}, L: {})\n\
             Win Rate: {}\n\
             \n\
             Total P&L: ${:.2}\n\
             Avg Trade: {}\n\
             Profit Factor: {}\n\
             Sharpe Ratio: {}\n\
             \n\
             Exit Reasons:\n\
             {}",
            period,
            self.total_trades,
            self.wins,
            self.losses,
            fmt_opt(self.win_rate.map(|w| w * 100.0), "%"),
            self.total_pnl,
            self.avg_pnl.map_or("n/a".to_string(), |p| format!("${:.2}", p)),
            fmt_opt(self.profit_factor, ""),
            fmt_opt(self.sharpe_ratio, ""),
            exits,
        )
    }
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) if v.is_infinite() => "inf".to_string(),
        Some(v) => format!("{:.2}{}", v, suffix),
    }
}

/// Secondary trade statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_winner: Option<f64>,
    pub avg_loser: Option<f64>,
    pub largest_winner: Option<f64>,
    pub largest_loser: Option<f64>,
    pub avg_days_held: Option<f64>,
    /// Largest peak-to-trough decline of cumulative P&L, as a positive amount.
    pub max_drawdown: f64,
    /// Average days held per exit reason, for reasons that occurred.
    pub avg_days_by_exit: BTreeMap<ExitReason, f64>,
}

/// P&L of trades closed in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnl {
    pub year: i32,
    pub month: u32,
    pub pnl: f64,
    pub trades: usize,
    pub win_rate: f64,
}

/// Stateless reducer from trades to statistics.
pub struct PerformanceAggregator;

impl PerformanceAggregator {
    /// Summarize a finished result list.
    pub fn summarize(results: &[TradeResult]) -> BacktestSummary {
        let total_trades = results.len();
        let wins = results.iter().filter(|t| t.is_winner()).count();
        let total_pnl: f64 = results.iter().map(|t| t.pnl).sum();

        let (win_rate, avg_pnl) = if total_trades > 0 {
            (
                Some(wins as f64 / total_trades as f64),
                Some(total_pnl / total_trades as f64),
            )
        } else {
            (None, None)
        };

        let (gross_profit, gross_loss) = Self::gross(results);

        let mut exit_reasons: BTreeMap<ExitReason, usize> =
            ExitReason::ALL.iter().map(|r| (*r, 0)).collect();
        for trade in results {
            *exit_reasons.entry(trade.exit_reason).or_default() += 1;
        }

        BacktestSummary {
            total_trades,
            wins,
            losses: total_trades - wins,
            win_rate,
            total_pnl,
            avg_pnl,
            profit_factor: Self::profit_factor(total_trades, gross_profit, gross_loss),
            sharpe_ratio: Self::sharpe_ratio(results),
            exit_reasons,
            start_date: results.iter().map(|t| t.entry_date).min(),
            end_date: results.iter().map(|t| t.exit_date).max(),
        }
    }

    /// Winner/loser breakdown, holding periods and drawdown.
    pub fn statistics(results: &[TradeResult]) -> TradeStatistics {
        let (gross_profit, gross_loss) = Self::gross(results);
        let winners: Vec<f64> = results.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losers: Vec<f64> = results.iter().filter(|t| !t.is_winner()).map(|t| t.pnl).collect();

        let mean = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let days: Vec<f64> = results.iter().map(|t| t.days_held() as f64).collect();

        let mut avg_days_by_exit = BTreeMap::new();
        for reason in ExitReason::ALL {
            let held: Vec<f64> = results
                .iter()
                .filter(|t| t.exit_reason == reason)
                .map(|t| t.days_held() as f64)
                .collect();
            if let Some(avg) = mean(&held) {
                avg_days_by_exit.insert(reason, avg);
            }
        }

        TradeStatistics {
            gross_profit,
            gross_loss,
            avg_winner: mean(&winners),
            avg_loser: mean(&losers),
            largest_winner: winners.iter().copied().reduce(f64::max),
            largest_loser: losers.iter().copied().reduce(f64::min),
            avg_days_held: mean(&days),
            max_drawdown: Self::max_drawdown(results),
            avg_days_by_exit,
        }
    }

    /// P&L grouped by exit month, oldest first.
    pub fn monthly_breakdown(results: &[TradeResult]) -> Vec<MonthlyPnl> {
        let mut monthly: BTreeMap<(i32, u32), Vec<&TradeResult>> = BTreeMap::new();
        for trade in results {
            let key = (trade.exit_date.year(), trade.exit_date.month());
            monthly.entry(key).or_default().push(trade);
        }

        monthly
            .into_iter()
            .map(|((year, month), trades)| {
                let winners = trades.iter().filter(|t| t.is_winner()).count();
                MonthlyPnl {
                    year,
                    month,
                    pnl: trades.iter().map(|t| t.pnl).sum(),
                    trades: trades.len(),
                    win_rate: winners as f64 / trades.len() as f64,
                }
            })
            .collect()
    }

    /// Sum of positive P&L and absolute sum of negative P&L.
    fn gross(results: &[TradeResult]) -> (f64, f64) {
        results.iter().fold((0.0, 0.0), |(profit, loss), t| {
            if t.pnl > 0.0 {
                (profit + t.pnl, loss)
            } else {
                (profit, loss - t.pnl)
            }
        })
    }

    fn profit_factor(total_trades: usize, gross_profit: f64, gross_loss: f64) -> Option<f64> {
        if total_trades == 0 {
            return None;
        }
        if gross_loss > 0.0 {
            Some(gross_profit / gross_loss)
        } else if gross_profit > 0.0 {
            Some(f64::INFINITY)
        } else {
            // Only break-even trades.
            None
        }
    }

    fn sharpe_ratio(results: &[TradeResult]) -> Option<f64> {
        if results.is_empty() {
            return None;
        }
        let pnl: Vec<f64> = results.iter().map(|t| t.pnl).collect();
        let mean = pnl.iter().mean();
        let std_dev = pnl.iter().population_std_dev();

        // Identical P&L can leave rounding residue instead of an exact zero.
        if !(std_dev > 1e-12 * mean.abs().max(1.0)) {
            return None;
        }
        Some(mean / std_dev)
    }

    fn max_drawdown(results: &[TradeResult]) -> f64 {
        let mut cumulative = 0.0_f64;
        let mut peak = 0.0_f64;
        let mut max_drawdown = 0.0_f64;
        for trade in results {
            cumulative += trade.pnl;
            peak = peak.max(cumulative);
            max_drawdown = max_drawdown.max(peak - cumulative);
        }
        max_drawdown
    }
}

/// Serde for ratios that may be `+inf`, which JSON cannot carry as a number.
mod infinite_ratio {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match value {
            Some(v) if *v == f64::INFINITY => Some(Repr::Text("inf".to_string())),
            Some(v) => Some(Repr::Number(*v)),
            None => None,
        };
        repr.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(s)) if s == "inf" => Ok(Some(f64::INFINITY)),
            Some(Repr::Text(s)) => Err(serde::de::Error::custom(format!(
                "expected a number or \"inf\", got \"{}\"",
                s
            ))),
        }
    }
}
