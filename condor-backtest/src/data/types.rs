//! Core data types for condor backtesting.
//!
//! Bars carry `Decimal` prices at the data boundary; the pricing layer works
//! in `f64` and converts on read.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestError, BacktestResult};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Daily bar data for the underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl PriceBar {
    /// Build a flat bar where open/high/low/close are all `close`.
    pub fn flat(date: NaiveDate, close: Decimal, volume: i64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// Closing price as `f64` for the pricing layer.
    pub fn close_f64(&self) -> f64 {
        self.close.try_into().unwrap_or(0.0)
    }
}

/// Check that a bar series is usable as backtest input.
///
/// The series must be non-empty, strictly ascending by date (which also rules
/// out duplicates), and carry positive closes. Violations are never repaired.
pub fn validate_bars(bars: &[PriceBar]) -> BacktestResult<()> {
    if bars.is_empty() {
        return Err(BacktestError::Precondition(
            "bar series is empty".to_string(),
        ));
    }

    for (idx, pair) in bars.windows(2).enumerate() {
        if pair[1].date == pair[0].date {
            return Err(BacktestError::Precondition(format!(
                "duplicate bar date {} at index {}",
                pair[1].date,
                idx + 1
            )));
        }
        if pair[1].date < pair[0].date {
            return Err(BacktestError::Precondition(format!(
                "bars not sorted: {} follows {} at index {}",
                pair[1].date,
                pair[0].date,
                idx + 1
            )));
        }
    }

    if let Some(bar) = bars.iter().find(|b| b.close <= Decimal::ZERO) {
        return Err(BacktestError::Precondition(format!(
            "non-positive close {} on {}",
            bar.close, bar.date
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_option_type_display() {
        assert_eq!(OptionType::Call.to_string(), "call");
        assert_eq!(OptionType::Put.as_str(), "put");
    }

    #[test]
    fn test_close_f64() {
        let bar = PriceBar::flat(day(1), dec!(590.25), 1_000);
        assert_eq!(bar.close_f64(), 590.25);
        assert_eq!(bar.high, bar.low);
    }

    #[test]
    fn test_validate_bars_accepts_sorted_series() {
        let bars = vec![
            PriceBar::flat(day(1), dec!(100), 0),
            PriceBar::flat(day(4), dec!(101), 0),
            PriceBar::flat(day(5), dec!(99), 0),
        ];
        assert!(validate_bars(&bars).is_ok());
    }

    #[test]
    fn test_validate_bars_rejects_empty() {
        let err = validate_bars(&[]).unwrap_err();
        assert!(matches!(err, BacktestError::Precondition(_)));
    }

    #[test]
    fn test_validate_bars_rejects_unsorted_and_duplicates() {
        let unsorted = vec![
            PriceBar::flat(day(2), dec!(100), 0),
            PriceBar::flat(day(1), dec!(100), 0),
        ];
        assert!(matches!(
            validate_bars(&unsorted),
            Err(BacktestError::Precondition(_))
        ));

        let duplicated = vec![
            PriceBar::flat(day(1), dec!(100), 0),
            PriceBar::flat(day(1), dec!(101), 0),
        ];
        let err = validate_bars(&duplicated).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_bars_rejects_non_positive_close() {
        let bars = vec![PriceBar::flat(day(1), dec!(0), 0)];
        assert!(validate_bars(&bars).is_err());
    }
}
