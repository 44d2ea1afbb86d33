//! Bar loader for underlying price history.
//!
//! Reads daily bars from CSV or Parquet (via polars) or JSON (via serde).
//! Tabular files must carry the columns:
//! - date (YYYY-MM-DD string or date)
//! - open, high, low, close
//! - volume
//!
//! Rows are returned in file order; unsorted input is rejected by the runner.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use super::types::PriceBar;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported bar file format: {0}")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported on-disk bar formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarFormat {
    Csv,
    Parquet,
    Json,
}

impl BarFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" | "pq" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            _ => Err(LoaderError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Loader for daily underlying bars.
pub struct BarLoader;

impl BarLoader {
    /// Load bars from a file, picking the reader by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<PriceBar>, LoaderError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let bars = match BarFormat::from_path(path)? {
            BarFormat::Json => {
                let reader = BufReader::new(File::open(path)?);
                serde_json::from_reader(reader)?
            }
            BarFormat::Csv => {
                let lf = LazyCsvReader::new(path).with_has_header(true).finish()?;
                Self::frame_to_bars(Self::select_columns(lf).collect()?)?
            }
            BarFormat::Parquet => {
                let lf = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?;
                Self::frame_to_bars(Self::select_columns(lf).collect()?)?
            }
        };

        debug!("Loaded {} bars from {}", bars.len(), path.display());
        Ok(bars)
    }

    /// Project and normalize the bar columns.
    fn select_columns(lf: LazyFrame) -> LazyFrame {
        lf.select([
            col("date").cast(DataType::String),
            col("open").cast(DataType::Float64),
            col("high").cast(DataType::Float64),
            col("low").cast(DataType::Float64),
            col("close").cast(DataType::Float64),
            col("volume").cast(DataType::Int64),
        ])
    }

    /// Convert a normalized DataFrame into bars.
    fn frame_to_bars(df: DataFrame) -> Result<Vec<PriceBar>, LoaderError> {
        let date_col = df.column("date")?.str()?;
        let open_col = df.column("open")?.f64()?;
        let high_col = df.column("high")?.f64()?;
        let low_col = df.column("low")?.f64()?;
        let close_col = df.column("close")?.f64()?;
        let volume_col = df.column("volume")?.i64()?;

        let mut bars = Vec::with_capacity(df.height());

        for idx in 0..df.height() {
            let date_str = date_col
                .get(idx)
                .ok_or_else(|| LoaderError::InvalidData(format!("row {}: missing date", idx)))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                LoaderError::InvalidData(format!("row {}: invalid date '{}': {}", idx, date_str, e))
            })?;

            let price = |value: Option<f64>, name: &str| -> Result<Decimal, LoaderError> {
                value
                    .and_then(Decimal::from_f64_retain)
                    .ok_or_else(|| {
                        LoaderError::InvalidData(format!("row {}: missing {}", idx, name))
                    })
            };

            bars.push(PriceBar {
                date,
                open: price(open_col.get(idx), "open")?,
                high: price(high_col.get(idx), "high")?,
                low: price(low_col.get(idx), "low")?,
                close: price(close_col.get(idx), "close")?,
                volume: volume_col.get(idx).unwrap_or(0),
            });
        }

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            BarFormat::from_path(Path::new("data/SPY.csv")).unwrap(),
            BarFormat::Csv
        );
        assert_eq!(
            BarFormat::from_path(Path::new("data/SPY.PARQUET")).unwrap(),
            BarFormat::Parquet
        );
        assert!(matches!(
            BarFormat::from_path(Path::new("data/SPY.xlsx")),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = BarLoader::load("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }

    #[test]
    fn test_load_csv_preserves_file_order() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-03,470.5,472.0,469.0,471.25,1000").unwrap();
        writeln!(file, "2024-01-02,468.0,471.0,467.5,470.0,1200").unwrap();
        file.flush().unwrap();

        let bars = BarLoader::load(file.path()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[0].close_f64(), 471.25);
        assert_eq!(bars[1].volume, 1200);
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"date":"2024-01-02","open":"468","high":"471","low":"467.5","close":"470","volume":1200}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        let bars = BarLoader::load(file.path()).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close_f64(), 470.0);
    }
}
