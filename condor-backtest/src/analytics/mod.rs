//! Market analytics feeding the pricing layer.
//!
//! - Realized volatility as a stand-in for implied volatility

pub mod volatility;

pub use volatility::{FixedVolatility, HistoricalVolatility, VolatilityEstimator};
