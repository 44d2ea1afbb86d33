//! Position lifecycle: open a condor, walk it forward, decide when it exits.
//!
//! A position is repriced every bar at the entry volatility, held constant for
//! the life of the trade. Exit rules are evaluated on each bar in fixed order,
//! first match wins:
//! 1. Stop loss: P&L at or below `-stop_loss_pct * credit`
//! 2. Profit target: P&L at or above `profit_target_pct * credit`
//! 3. Expired: no days remaining, settled at intrinsic value
//! 4. Time exit: days remaining at or below `max_dte`

use chrono::NaiveDate;
use tracing::debug;

use crate::analytics::VolatilityEstimator;
use crate::data::{OptionType, PriceBar};
use crate::pricing::{BlackScholes, StrikeSolver};

use super::config::StrategyConfig;
use super::error::{BacktestError, BacktestResult};
use super::trade::{
    CondorPosition, ExitReason, LegSide, OptionLeg, TradeResult, CONTRACT_MULTIPLIER,
};

/// Calendar days per year for converting DTE to option time.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Result of stepping an open position through one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Open(CondorPosition),
    Closed(TradeResult),
}

/// Opens and steps condor positions under one strategy config.
pub struct PositionSimulator<'a, V: VolatilityEstimator> {
    config: &'a StrategyConfig,
    bs: BlackScholes,
    solver: StrikeSolver,
    estimator: &'a V,
}

impl<'a, V: VolatilityEstimator> PositionSimulator<'a, V> {
    pub fn new(config: &'a StrategyConfig, estimator: &'a V) -> Self {
        let bs = BlackScholes::new(config.risk_free_rate);
        Self {
            config,
            bs,
            solver: StrikeSolver::new(bs),
            estimator,
        }
    }

    /// Open a condor on the last bar of `bars_up_to_entry`.
    ///
    /// Fails with a recoverable error when strikes cannot be solved or the
    /// priced credit is not positive; no position is opened in either case.
    pub fn open_position(
        &self,
        entry_date: NaiveDate,
        expiration: NaiveDate,
        bars_up_to_entry: &[PriceBar],
    ) -> BacktestResult<CondorPosition> {
        let entry_bar = match bars_up_to_entry.last() {
            Some(bar) if bar.date == entry_date => bar,
            Some(bar) => {
                return Err(BacktestError::Precondition(format!(
                    "entry bar is {} but entry date is {}",
                    bar.date, entry_date
                )))
            }
            None => {
                return Err(BacktestError::Precondition(format!(
                    "no bars up to entry date {}",
                    entry_date
                )))
            }
        };

        let spot = entry_bar.close_f64();
        let dte = (expiration - entry_date).num_days();
        let time = dte as f64 / DAYS_PER_YEAR;
        let vol = self.estimator.estimate(bars_up_to_entry);

        let short_put_strike = self.solver.strike_from_delta(
            spot,
            time,
            vol,
            -self.config.short_delta,
            OptionType::Put,
        )?;
        let short_call_strike = self.solver.strike_from_delta(
            spot,
            time,
            vol,
            self.config.short_delta,
            OptionType::Call,
        )?;
        let long_put_strike = short_put_strike - self.config.wing_width;
        let long_call_strike = short_call_strike + self.config.wing_width;

        let leg = |side, option_type, strike| {
            let price = self.bs.price(spot, strike, time, vol, option_type);
            OptionLeg::new(side, option_type, strike, price)
        };
        let short_put = leg(LegSide::Short, OptionType::Put, short_put_strike);
        let long_put = leg(LegSide::Long, OptionType::Put, long_put_strike);
        let short_call = leg(LegSide::Short, OptionType::Call, short_call_strike);
        let long_call = leg(LegSide::Long, OptionType::Call, long_call_strike);

        let credit = ((short_put.entry_price - long_put.entry_price)
            + (short_call.entry_price - long_call.entry_price))
            * CONTRACT_MULTIPLIER;

        // Also catches NaN from a wing strike at or below zero.
        if !(credit > 0.0) {
            return Err(BacktestError::InvalidCredit { entry_date, credit });
        }

        Ok(CondorPosition {
            entry_date,
            expiration,
            dte_at_entry: dte,
            short_put,
            long_put,
            short_call,
            long_call,
            net_credit_received: credit,
            underlying_price_at_entry: spot,
            iv_at_entry: vol,
        })
    }

    /// Reprice at the bar close and apply the exit rules.
    pub fn step(
        &self,
        mut position: CondorPosition,
        bar: &PriceBar,
        days_remaining: i64,
    ) -> StepOutcome {
        let spot = bar.close_f64();
        self.reprice(&mut position, spot, days_remaining);

        let pnl = position.unrealized_pnl();
        let credit = position.net_credit_received;

        let exit_reason = if pnl <= -self.config.stop_loss_pct * credit {
            Some(ExitReason::StopLoss)
        } else if pnl >= self.config.profit_target_pct * credit {
            Some(ExitReason::ProfitTarget)
        } else if days_remaining <= 0 {
            Some(ExitReason::Expired)
        } else if days_remaining <= self.config.max_dte {
            Some(ExitReason::TimeExit)
        } else {
            None
        };

        match exit_reason {
            Some(reason) => {
                debug!(
                    "Exit {} on {}: pnl ${:.2} on credit ${:.2}, {} days remaining",
                    reason, bar.date, pnl, credit, days_remaining
                );
                let dte_at_exit = days_remaining.max(0);
                StepOutcome::Closed(position.close(bar.date, spot, dte_at_exit, reason))
            }
            None => StepOutcome::Open(position),
        }
    }

    /// Force-settle at intrinsic value against `bar` as expired.
    pub fn settle(
        &self,
        mut position: CondorPosition,
        bar: &PriceBar,
        days_remaining: i64,
    ) -> TradeResult {
        let spot = bar.close_f64();
        self.reprice(&mut position, spot, 0);
        debug!(
            "Settled position from {} on {} with {} days remaining",
            position.entry_date, bar.date, days_remaining
        );
        position.close(bar.date, spot, days_remaining.max(0), ExitReason::Expired)
    }

    fn reprice(&self, position: &mut CondorPosition, spot: f64, days_remaining: i64) {
        let time = days_remaining.max(0) as f64 / DAYS_PER_YEAR;
        let vol = position.iv_at_entry;
        position.mark_to_market(|leg| {
            self.bs
                .price(spot, leg.strike, time, vol, leg.option_type)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::FixedVolatility;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn entry_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn bar(days_after_entry: i64, close: f64) -> PriceBar {
        PriceBar::flat(
            entry_date() + Duration::days(days_after_entry),
            Decimal::from_f64_retain(close).unwrap(),
            1_000_000,
        )
    }

    fn open(sim: &PositionSimulator<'_, FixedVolatility>, dte: i64) -> CondorPosition {
        let expiration = entry_date() + Duration::days(dte);
        sim.open_position(entry_date(), expiration, &[bar(0, 590.0)])
            .unwrap()
    }

    #[test]
    fn test_open_position_structure() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);

        assert!(pos.short_put.strike < 590.0 && pos.short_call.strike > 590.0);
        assert_relative_eq!(pos.short_put.strike - pos.long_put.strike, 5.0, epsilon = 1e-9);
        assert_relative_eq!(pos.long_call.strike - pos.short_call.strike, 5.0, epsilon = 1e-9);
        assert!(pos.net_credit_received > 0.0);
        assert!(pos.net_credit_received < config.wing_width * CONTRACT_MULTIPLIER);
        assert_eq!(pos.dte_at_entry, 30);
        assert_eq!(pos.iv_at_entry, 0.18);
        assert_relative_eq!(pos.unrealized_pnl(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_entry_bar_must_match_entry_date() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let expiration = entry_date() + Duration::days(30);

        let err = sim.open_position(entry_date(), expiration, &[bar(-1, 590.0)]).unwrap_err();
        assert!(matches!(err, BacktestError::Precondition(_)));
        let err = sim.open_position(entry_date(), expiration, &[]).unwrap_err();
        assert!(matches!(err, BacktestError::Precondition(_)));
    }

    #[test]
    fn test_wing_below_zero_is_invalid_credit() {
        let config = StrategyConfig {
            wing_width: 1_000.0,
            ..Default::default()
        };
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let err = sim
            .open_position(entry_date(), entry_date() + Duration::days(30), &[bar(0, 590.0)])
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidCredit { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_zero_vol_fails_to_converge() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.0);
        let sim = PositionSimulator::new(&config, &vol);
        let err = sim
            .open_position(entry_date(), entry_date() + Duration::days(30), &[bar(0, 590.0)])
            .unwrap_err();
        assert!(matches!(err, BacktestError::Convergence(_)));
    }

    #[test]
    fn test_quiet_day_stays_open() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);

        match sim.step(pos, &bar(1, 590.0), 29) {
            StepOutcome::Open(pos) => {
                assert!(pos.unrealized_pnl().abs() < 0.5 * pos.net_credit_received);
            }
            StepOutcome::Closed(trade) => panic!("closed early: {:?}", trade.exit_reason),
        }
    }

    #[test]
    fn test_crash_hits_stop_loss() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);
        let credit = pos.net_credit_received;

        // 20 points through the short put is only about 1.5x credit with 29
        // days left; the stop needs a deeper break.
        match sim.step(pos.clone(), &bar(1, pos.short_put.strike - 20.0), 29) {
            StepOutcome::Open(still_open) => {
                assert!(still_open.unrealized_pnl() < 0.0);
                assert!(still_open.unrealized_pnl() > -2.0 * credit);
            }
            StepOutcome::Closed(trade) => panic!("closed early: {:?}", trade.exit_reason),
        }

        match sim.step(pos, &bar(1, 400.0), 29) {
            StepOutcome::Closed(trade) => {
                assert_eq!(trade.exit_reason, ExitReason::StopLoss);
                assert!(trade.pnl <= -2.0 * trade.credit_received);
                assert_relative_eq!(
                    trade.put_side_pnl + trade.call_side_pnl,
                    trade.pnl,
                    epsilon = 1e-9
                );
                assert!(trade.call_side_pnl > 0.0);
            }
            StepOutcome::Open(_) => panic!("stop loss did not fire"),
        }
    }

    #[test]
    fn test_stop_loss_wins_over_profit_target() {
        // Unvalidated thresholds that overlap: a crash crosses both at once.
        let config = StrategyConfig {
            profit_target_pct: -100.0,
            ..Default::default()
        };
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);

        match sim.step(pos, &bar(1, 400.0), 29) {
            StepOutcome::Closed(trade) => {
                assert!(trade.pnl >= -100.0 * trade.credit_received);
                assert_eq!(trade.exit_reason, ExitReason::StopLoss);
            }
            StepOutcome::Open(_) => panic!("no exit fired"),
        }
    }

    #[test]
    fn test_time_exit_at_threshold() {
        let config = StrategyConfig {
            profit_target_pct: 1.0,
            ..Default::default()
        };
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);

        let pos = open(&sim, 30);
        match sim.step(pos, &bar(23, 590.0), 7) {
            StepOutcome::Closed(trade) => {
                assert_eq!(trade.exit_reason, ExitReason::TimeExit);
                assert_eq!(trade.dte_at_exit, 7);
            }
            StepOutcome::Open(_) => panic!("time exit did not fire"),
        }
    }

    #[test]
    fn test_expiry_precedes_time_exit() {
        // Full-credit target so keeping credit - $50 stays below it.
        let config = StrategyConfig {
            profit_target_pct: 1.0,
            ..Default::default()
        };
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);
        let credit = pos.net_credit_received;
        // Half a point in the money on the short put: P&L is credit - $50.
        let spot = pos.short_put.strike - 0.5;

        match sim.step(pos, &bar(30, spot), 0) {
            StepOutcome::Closed(trade) => {
                assert_eq!(trade.exit_reason, ExitReason::Expired);
                assert_eq!(trade.dte_at_exit, 0);
                assert_relative_eq!(trade.pnl, credit - 50.0, epsilon = 1e-6);
            }
            StepOutcome::Open(_) => panic!("expiry did not fire"),
        }
    }

    #[test]
    fn test_settle_uses_intrinsic_value() {
        let config = StrategyConfig::default();
        let vol = FixedVolatility(0.18);
        let sim = PositionSimulator::new(&config, &vol);
        let pos = open(&sim, 30);
        let credit = pos.net_credit_received;
        let long_put = pos.long_put.strike;

        // Below both put strikes: the put spread is worth the full wing.
        let trade = sim.settle(pos, &bar(10, long_put - 10.0), 20);
        assert_eq!(trade.exit_reason, ExitReason::Expired);
        assert_eq!(trade.dte_at_exit, 20);
        assert_relative_eq!(trade.pnl, credit - 5.0 * CONTRACT_MULTIPLIER, epsilon = 1e-6);
    }
}
