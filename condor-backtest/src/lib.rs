pub mod analytics;
pub mod backtest;
pub mod data;
pub mod metrics;
pub mod pricing;
pub mod sweep;

// Re-export commonly used types
pub use analytics::{FixedVolatility, HistoricalVolatility, VolatilityEstimator};
pub use backtest::{
    BacktestError, BacktestReport, BacktestResult, BacktestRunner, ExitReason, ExpirationCycle,
    StrategyConfig, TradeResult,
};
pub use data::{BarLoader, OptionType, PriceBar};
pub use metrics::{BacktestSummary, PerformanceAggregator};
pub use pricing::{BlackScholes, StrikeSolver};
pub use sweep::{run_sweep, ParameterGrid, SweepResult};
