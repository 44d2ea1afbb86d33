//! Iron condor backtester.
//!
//! # Usage
//!
//! ```bash
//! # Run a single backtest with the default strategy
//! condor-backtest run --bars data/spy.csv
//!
//! # Override strategy parameters and save the full report
//! condor-backtest run --bars data/spy.parquet --config strategy.toml \
//!     --short-delta 0.20 --output report.json
//!
//! # Sweep a parameter grid and show the ten best combinations
//! condor-backtest sweep --bars data/spy.csv --grid grid.toml --top 10
//!
//! # Print the default strategy config
//! condor-backtest defaults
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use condor_backtest::{
    run_sweep, BacktestRunner, BarLoader, ExpirationCycle, ParameterGrid, PerformanceAggregator,
    PriceBar, StrategyConfig,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "condor-backtest")]
#[command(about = "Iron condor options backtesting engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest
    Run {
        /// Bar file (CSV, Parquet or JSON)
        #[arg(short, long)]
        bars: PathBuf,

        /// Strategy config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: StrategyOverrides,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Backtest every point of a parameter grid in parallel
    Sweep {
        /// Bar file (CSV, Parquet or JSON)
        #[arg(short, long)]
        bars: PathBuf,

        /// Base strategy config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parameter grid file (TOML)
        #[arg(short, long)]
        grid: Option<PathBuf>,

        /// Number of ranked results to print
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write all ranked results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default strategy config as TOML
    Defaults,
}

/// Command-line overrides applied on top of the config file.
#[derive(Args)]
struct StrategyOverrides {
    #[arg(long)]
    symbol: Option<String>,
    #[arg(long)]
    short_delta: Option<f64>,
    #[arg(long)]
    wing_width: Option<f64>,
    #[arg(long)]
    dte_min: Option<i64>,
    #[arg(long)]
    dte_max: Option<i64>,
    #[arg(long)]
    profit_target: Option<f64>,
    #[arg(long)]
    stop_loss: Option<f64>,
    #[arg(long)]
    max_dte: Option<i64>,
    #[arg(long)]
    rate: Option<f64>,
    /// monthly, weekly or continuous
    #[arg(long)]
    cycle: Option<ExpirationCycle>,
}

impl StrategyOverrides {
    fn apply(self, config: &mut StrategyConfig) {
        if let Some(v) = self.symbol {
            config.underlying_symbol = v;
        }
        if let Some(v) = self.short_delta {
            config.short_delta = v;
        }
        if let Some(v) = self.wing_width {
            config.wing_width = v;
        }
        if let Some(v) = self.dte_min {
            config.dte_min = v;
        }
        if let Some(v) = self.dte_max {
            config.dte_max = v;
        }
        if let Some(v) = self.profit_target {
            config.profit_target_pct = v;
        }
        if let Some(v) = self.stop_loss {
            config.stop_loss_pct = v;
        }
        if let Some(v) = self.max_dte {
            config.max_dte = v;
        }
        if let Some(v) = self.rate {
            config.risk_free_rate = v;
        }
        if let Some(v) = self.cycle {
            config.expiration_cycle = v;
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    match path {
        Some(path) => StrategyConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(StrategyConfig::default()),
    }
}

fn load_bars(path: &Path) -> Result<Vec<PriceBar>> {
    BarLoader::load(path).with_context(|| format!("Failed to load bars from {}", path.display()))
}

fn cmd_run(
    bars: PathBuf,
    config: Option<PathBuf>,
    overrides: StrategyOverrides,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    overrides.apply(&mut config);
    let bars = load_bars(&bars)?;

    let report = BacktestRunner::new(config)
        .run_report(&bars)
        .context("Backtest failed")?;
    let stats = PerformanceAggregator::statistics(&report.trades);

    println!("{}", SEPARATOR);
    println!("{}", report.summary.report());
    println!("{}", SEPARATOR);
    println!("Skipped entries: {}", report.skipped_entries);
    println!("Max drawdown: ${:.2}", stats.max_drawdown);
    if let Some(days) = stats.avg_days_held {
        println!("Avg days held: {:.1}", days);
    }

    let months = PerformanceAggregator::monthly_breakdown(&report.trades);
    if !months.is_empty() {
        println!("\nMonthly P&L:");
        for m in &months {
            println!(
                "  {}-{:02}: ${:>10.2}  ({} trades, {:.0}% won)",
                m.year,
                m.month,
                m.pnl,
                m.trades,
                m.win_rate * 100.0
            );
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}

fn cmd_sweep(
    bars: PathBuf,
    config: Option<PathBuf>,
    grid: Option<PathBuf>,
    top: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let base = load_config(config.as_deref())?;
    let grid = match grid {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read grid {}", path.display()))?;
            toml::from_str::<ParameterGrid>(&text)
                .with_context(|| format!("Invalid grid {}", path.display()))?
        }
        None => ParameterGrid::default(),
    };
    let bars = load_bars(&bars)?;

    let pb = ProgressBar::new(grid.combinations(&base).len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message(base.underlying_symbol.clone());

    let results = run_sweep(&bars, &base, &grid, &|done, _| pb.set_position(done as u64))
        .context("Sweep failed")?;
    pb.finish_and_clear();

    println!("{}", SEPARATOR);
    println!("Top {} of {} combinations by total P&L", top.min(results.len()), results.len());
    println!("{}", SEPARATOR);
    for (rank, result) in results.iter().take(top).enumerate() {
        let s = &result.summary;
        println!(
            "{:>3}. {:<28} P&L ${:>10.2}  trades {:>4}  win {:>6}  pf {:>6}",
            rank + 1,
            result.params.key(),
            s.total_pnl,
            s.total_trades,
            s.win_rate.map_or("n/a".to_string(), |w| format!("{:.1}%", w * 100.0)),
            s.profit_factor.map_or("n/a".to_string(), |p| {
                if p.is_infinite() {
                    "inf".to_string()
                } else {
                    format!("{:.2}", p)
                }
            }),
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nResults written to {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("condor_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            bars,
            config,
            overrides,
            output,
        } => cmd_run(bars, config, overrides, output)?,
        Commands::Sweep {
            bars,
            config,
            grid,
            top,
            output,
        } => cmd_sweep(bars, config, grid, top, output)?,
        Commands::Defaults => {
            print!("{}", StrategyConfig::default().to_toml_string()?);
        }
    }

    Ok(())
}
