//! Error taxonomy for the simulation engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::pricing::ConvergenceError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    /// Strike solver could not bracket the target delta. Skips the entry.
    #[error("Strike solver failed: {0}")]
    Convergence(#[from] ConvergenceError),

    /// Net credit at entry was not positive. Skips the entry.
    #[error("Invalid credit {credit:.4} for entry on {entry_date}")]
    InvalidCredit { entry_date: NaiveDate, credit: f64 },

    /// Input cannot be trusted. Aborts the run.
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl BacktestError {
    /// Whether the runner may skip this entry attempt and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Convergence(_) | Self::InvalidCredit { .. })
    }
}

pub type BacktestResult<T> = Result<T, BacktestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;

    #[test]
    fn test_recoverability() {
        let convergence = BacktestError::from(ConvergenceError {
            option_type: OptionType::Put,
            target_delta: -0.16,
            spot: 100.0,
            time: 0.0,
            vol: 0.2,
        });
        let credit = BacktestError::InvalidCredit {
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            credit: -1.0,
        };
        let precondition = BacktestError::Precondition("empty".to_string());

        assert!(convergence.is_recoverable());
        assert!(credit.is_recoverable());
        assert!(!precondition.is_recoverable());
    }
}
