//! Iron condor position and trade records.
//!
//! Handles the trade lifecycle data:
//! - Legs with entry and current marks
//! - Per-side and total P&L of an open position
//! - Conversion of a closed position into an immutable `TradeResult`
//!
//! Option prices are per share; every dollar amount on a position or trade is
//! per one condor (price times the contract multiplier).

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::OptionType;

/// Shares per option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Whether a leg was bought or sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegSide {
    Long,
    Short,
}

/// Reason a position was closed. Every variant is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Captured the configured fraction of credit.
    ProfitTarget,
    /// Loss reached the configured multiple of credit.
    StopLoss,
    /// Days remaining fell to the time-exit threshold.
    TimeExit,
    /// Held to expiration (or to the end of the bar series).
    Expired,
}

impl ExitReason {
    pub const ALL: [ExitReason; 4] = [
        ExitReason::ProfitTarget,
        ExitReason::StopLoss,
        ExitReason::TimeExit,
        ExitReason::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::ProfitTarget => "profit_target",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeExit => "time_exit",
            ExitReason::Expired => "expired",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single leg of the condor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub side: LegSide,
    pub option_type: OptionType,
    pub strike: f64,
    /// Per-share price at entry.
    pub entry_price: f64,
    /// Per-share mark from the latest step.
    pub current_price: f64,
}

impl OptionLeg {
    pub fn new(side: LegSide, option_type: OptionType, strike: f64, entry_price: f64) -> Self {
        Self {
            side,
            option_type,
            strike,
            entry_price,
            current_price: entry_price,
        }
    }

    /// Unrealized P&L in dollars for one contract.
    pub fn unrealized_pnl(&self) -> f64 {
        let per_share = match self.side {
            LegSide::Short => self.entry_price - self.current_price,
            LegSide::Long => self.current_price - self.entry_price,
        };
        per_share * CONTRACT_MULTIPLIER
    }
}

/// An open iron condor: short put spread plus short call spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondorPosition {
    pub entry_date: NaiveDate,
    pub expiration: NaiveDate,
    pub dte_at_entry: i64,
    pub short_put: OptionLeg,
    pub long_put: OptionLeg,
    pub short_call: OptionLeg,
    pub long_call: OptionLeg,
    /// Dollars received at entry.
    pub net_credit_received: f64,
    pub underlying_price_at_entry: f64,
    /// Volatility used to price the position for its whole life.
    pub iv_at_entry: f64,
}

impl CondorPosition {
    pub fn legs(&self) -> [&OptionLeg; 4] {
        [&self.short_put, &self.long_put, &self.short_call, &self.long_call]
    }

    /// Re-mark every leg with `price_leg`, which returns a per-share price.
    pub fn mark_to_market(&mut self, mut price_leg: impl FnMut(&OptionLeg) -> f64) {
        for leg in [
            &mut self.short_put,
            &mut self.long_put,
            &mut self.short_call,
            &mut self.long_call,
        ] {
            leg.current_price = price_leg(leg);
        }
    }

    pub fn put_side_pnl(&self) -> f64 {
        self.short_put.unrealized_pnl() + self.long_put.unrealized_pnl()
    }

    pub fn call_side_pnl(&self) -> f64 {
        self.short_call.unrealized_pnl() + self.long_call.unrealized_pnl()
    }

    /// Dollars needed to buy the condor back at current marks.
    pub fn value_to_close(&self) -> f64 {
        (self.short_put.current_price + self.short_call.current_price
            - self.long_put.current_price
            - self.long_call.current_price)
            * CONTRACT_MULTIPLIER
    }

    /// Credit received minus cost to close, as the sum of both sides.
    pub fn unrealized_pnl(&self) -> f64 {
        self.put_side_pnl() + self.call_side_pnl()
    }

    /// Terminate the position at its current marks.
    pub fn close(
        self,
        exit_date: NaiveDate,
        underlying_at_exit: f64,
        dte_at_exit: i64,
        exit_reason: ExitReason,
    ) -> TradeResult {
        let put_side_pnl = self.put_side_pnl();
        let call_side_pnl = self.call_side_pnl();

        TradeResult {
            exit_reason,
            pnl: put_side_pnl + call_side_pnl,
            entry_date: self.entry_date,
            exit_date,
            expiration: self.expiration,
            dte_at_entry: self.dte_at_entry,
            dte_at_exit,
            short_put_strike: self.short_put.strike,
            long_put_strike: self.long_put.strike,
            short_call_strike: self.short_call.strike,
            long_call_strike: self.long_call.strike,
            credit_received: self.net_credit_received,
            underlying_at_entry: self.underlying_price_at_entry,
            underlying_at_exit,
            iv_at_entry: self.iv_at_entry,
            put_side_pnl,
            call_side_pnl,
        }
    }
}

/// A completed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub exit_reason: ExitReason,
    /// Realized P&L in dollars.
    pub pnl: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub expiration: NaiveDate,
    pub dte_at_entry: i64,
    pub dte_at_exit: i64,
    pub short_put_strike: f64,
    pub long_put_strike: f64,
    pub short_call_strike: f64,
    pub long_call_strike: f64,
    pub credit_received: f64,
    pub underlying_at_entry: f64,
    pub underlying_at_exit: f64,
    pub iv_at_entry: f64,
    pub put_side_pnl: f64,
    pub call_side_pnl: f64,
}

impl TradeResult {
    /// Calendar days between entry and exit.
    pub fn days_held(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
