pub mod loader;
pub mod types;

pub use loader::{BarFormat, BarLoader, LoaderError};
pub use types::{validate_bars, OptionType, PriceBar};
