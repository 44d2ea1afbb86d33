//! Strategy parameters for an iron condor backtest.
//!
//! Every field carries a serde default, so a partial TOML or JSON file only
//! needs the values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analytics::HistoricalVolatility;

use super::error::{BacktestError, BacktestResult};
use super::expiration::ExpirationCycle;

/// Errors raised while reading or writing a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] BacktestError),

    #[error("Unsupported config extension: {0}")]
    UnsupportedFormat(String),
}

/// Immutable parameter set governing strike selection and exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Ticker label carried into reports.
    pub underlying_symbol: String,

    /// Target |delta| for both short strikes.
    pub short_delta: f64,

    /// Distance from each short strike to its protective long strike.
    pub wing_width: f64,

    /// Entry window lower bound, in calendar days to expiration.
    pub dte_min: i64,

    /// Entry window upper bound.
    pub dte_max: i64,

    /// Fraction of credit to capture (0.50 = close at half the credit).
    pub profit_target_pct: f64,

    /// Loss multiple of credit that triggers the stop (2.0 = lose 2x credit).
    pub stop_loss_pct: f64,

    /// Close once days remaining falls to this threshold.
    pub max_dte: i64,

    pub risk_free_rate: f64,

    /// Which expirations are listed for entry.
    pub expiration_cycle: ExpirationCycle,

    /// Realized-volatility estimator settings.
    pub volatility: HistoricalVolatility,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            underlying_symbol: "SPY".to_string(),
            short_delta: 0.16,
            wing_width: 5.0,
            dte_min: 30,
            dte_max: 45,
            profit_target_pct: 0.50,
            stop_loss_pct: 2.00,
            max_dte: 7,
            risk_free_rate: 0.05,
            expiration_cycle: ExpirationCycle::default(),
            volatility: HistoricalVolatility::default(),
        }
    }
}

impl StrategyConfig {
    /// Check parameter invariants. A violation aborts any run using this config.
    pub fn validate(&self) -> BacktestResult<()> {
        let fail = |msg: String| Err(BacktestError::Precondition(msg));

        if !(self.short_delta > 0.0 && self.short_delta < 0.5) {
            return fail(format!("short_delta must be in (0, 0.5), got {}", self.short_delta));
        }
        if !(self.wing_width > 0.0) {
            return fail(format!("wing_width must be positive, got {}", self.wing_width));
        }
        if self.dte_min >= self.dte_max {
            return fail(format!(
                "dte_min ({}) must be less than dte_max ({})",
                self.dte_min, self.dte_max
            ));
        }
        if !(self.profit_target_pct > 0.0 && self.profit_target_pct <= 1.0) {
            return fail(format!(
                "profit_target_pct must be in (0, 1], got {}",
                self.profit_target_pct
            ));
        }
        if !(self.stop_loss_pct >= 1.0) {
            return fail(format!("stop_loss_pct must be >= 1, got {}", self.stop_loss_pct));
        }
        if self.max_dte < 0 || self.max_dte >= self.dte_min {
            return fail(format!(
                "max_dte must be in [0, dte_min), got {} with dte_min {}",
                self.max_dte, self.dte_min
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return fail("risk_free_rate must be finite".to_string());
        }
        let vol = &self.volatility;
        if vol.lookback == 0 || !(vol.min_vol > 0.0 && vol.min_vol <= vol.max_vol) {
            return fail(format!(
                "volatility settings invalid: lookback={}, min_vol={}, max_vol={}",
                vol.lookback, vol.min_vol, vol.max_vol
            ));
        }
        if !(vol.default_vol > 0.0 && vol.default_vol.is_finite()) {
            return fail(format!(
                "volatility default_vol must be positive, got {}",
                vol.default_vol
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Load a config, choosing the format by file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_default_is_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.underlying_symbol, "SPY");
        assert_eq!(config.short_delta, 0.16);
        assert_eq!(config.max_dte, 7);
    }

    #[test]
    fn test_invariant_violations() {
        let cases: [fn(&mut StrategyConfig); 11] = [
            |c| c.short_delta = 0.5,
            |c| c.short_delta = 0.0,
            |c| c.short_delta = f64::NAN,
            |c| c.wing_width = 0.0,
            |c| c.dte_min = 45,
            |c| c.profit_target_pct = 1.5,
            |c| c.stop_loss_pct = 0.9,
            |c| c.max_dte = 30,
            |c| c.max_dte = -1,
            |c| c.volatility.default_vol = 0.0,
            |c| c.volatility.default_vol = f64::INFINITY,
        ];
        for mutate in cases {
            let mut config = StrategyConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(matches!(err, BacktestError::Precondition(_)), "{:?}", config);
        }
    }

    #[test]
    fn test_zero_default_vol_rejected_from_toml() {
        let err = StrategyConfig::from_toml_str("[volatility]\ndefault_vol = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(BacktestError::Precondition(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StrategyConfig::from_toml_str(
            r#"
            underlying_symbol = "QQQ"
            wing_width = 10.0
            expiration_cycle = "weekly"

            [volatility]
            lookback = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.underlying_symbol, "QQQ");
        assert_eq!(config.wing_width, 10.0);
        assert_eq!(config.expiration_cycle, ExpirationCycle::Weekly);
        assert_eq!(config.volatility.lookback, 30);
        assert_eq!(config.volatility.default_vol, 0.18);
        assert_eq!(config.short_delta, 0.16);
    }

    #[test]
    fn test_invalid_toml_config_rejected() {
        let err = StrategyConfig::from_toml_str("short_delta = 0.7").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = StrategyConfig {
            short_delta: 0.20,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(StrategyConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut json = Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"dte_min": 20, "dte_max": 40}}"#).unwrap();
        let config = StrategyConfig::from_file(json.path()).unwrap();
        assert_eq!((config.dte_min, config.dte_max), (20, 40));

        let yaml = Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            StrategyConfig::from_file(yaml.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
