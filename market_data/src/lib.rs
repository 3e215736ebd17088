//! # Market Data
//!
//! `market_data` loads daily OHLCV (Open, High, Low, Close, Volume) series
//! for B3 equities and keeps them in a read-through disk cache.
//!
//! ## Components
//!
//! - [`PriceSeries`]: date-indexed price table backed by a polars `DataFrame`
//! - [`PriceProvider`]: source of raw history, with a Yahoo chart API client
//! - [`ParquetCache`]: one parquet file per ticker with an age-based freshness check
//! - [`DataLoader`]: cache-or-fetch loading with retries and cleaning
//! - [`PriceSummary`]: latest close, last change, price range and average volume
//! - [`AppConfig`]: dashboard defaults, optionally read from TOML
//!
//! ## Usage Example
//!
//! ```no_run
//! use market_data::{AppConfig, DataLoader, YahooProvider};
//! use market_data::config::default_date_range;
//!
//! let config = AppConfig::default();
//! let provider = YahooProvider::new(config.provider_timeout()).unwrap();
//! let loader = DataLoader::new(provider, &config, true).unwrap();
//!
//! let (start, end) = default_date_range(config.default_period_months);
//! let series = loader.load_ticker_data("VALE3.SA", start, end, false).unwrap();
//! println!("Loaded {} rows", series.len());
//! ```

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod loader;
pub mod metrics;
pub mod provider;
pub mod series;
pub mod utils;

pub use cache::ParquetCache;
pub use config::AppConfig;
pub use loader::DataLoader;
pub use metrics::PriceSummary;
pub use provider::{PriceProvider, YahooProvider};
pub use series::PriceSeries;

/// Errors that can occur while loading market data
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

/// Result type for market data operations
pub type Result<T> = std::result::Result<T, MarketDataError>;

impl From<PolarsError> for MarketDataError {
    fn from(err: PolarsError) -> Self {
        MarketDataError::Polars(err.to_string())
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        MarketDataError::Provider(err.to_string())
    }
}

impl From<toml::de::Error> for MarketDataError {
    fn from(err: toml::de::Error) -> Self {
        MarketDataError::Config(err.to_string())
    }
}

/// OHLCV values for one trading day. Missing prices are stored as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvData {
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: u64,
}

impl OhlcvData {
    /// True when every price field is missing
    pub fn is_blank(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_nan())
    }
}

/// Daily OHLCV data with a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOhlcv {
    /// Date of the data point
    pub date: NaiveDate,
    /// OHLCV data
    pub data: OhlcvData,
}
